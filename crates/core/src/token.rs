// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential broker: checks the shared agent secret and mints/verifies
//! short-lived signed access tokens.
//!
//! The credential check is a single shared secret compared for equality, not
//! a per-identity credential. [`CredentialBroker::validate_credentials`] is
//! the one place to swap that out.

use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::epoch_secs;
use crate::error::Error;

/// Default token lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity the token was issued to.
    #[serde(rename = "system_uuid")]
    pub identity: String,
    /// Issued at (epoch seconds).
    pub iat: u64,
    /// Expiry (epoch seconds).
    pub exp: u64,
}

/// A freshly issued token with its decoded claims.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub claims: Claims,
}

/// Static configuration for a [`CredentialBroker`].
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub agent_secret: String,
    pub signing_key: String,
    pub algorithm: Algorithm,
    pub ttl: Duration,
}

/// Validates agent credentials and mints/verifies HMAC-signed tokens.
pub struct CredentialBroker {
    agent_secret: String,
    algorithm: Algorithm,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialBroker {
    pub fn new(settings: BrokerSettings) -> anyhow::Result<Self> {
        if settings.signing_key.is_empty() {
            anyhow::bail!("signing key must not be empty");
        }
        if !matches!(settings.algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            anyhow::bail!("unsupported signing algorithm: {:?}", settings.algorithm);
        }
        if settings.ttl.is_zero() {
            anyhow::bail!("token ttl must be positive");
        }
        Ok(Self {
            agent_secret: settings.agent_secret,
            algorithm: settings.algorithm,
            ttl: settings.ttl,
            encoding_key: EncodingKey::from_secret(settings.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.signing_key.as_bytes()),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check a presented secret against the configured agent secret.
    pub fn validate_credentials(&self, _identity: &str, secret: &str) -> bool {
        constant_time_eq(secret, &self.agent_secret)
    }

    /// Issue a token for `identity` if `secret` is valid.
    pub fn issue(&self, identity: &str, secret: &str) -> Result<AccessToken, Error> {
        self.issue_at(identity, secret, epoch_secs())
    }

    /// Issue a token as if the current time were `now` (epoch seconds).
    pub fn issue_at(&self, identity: &str, secret: &str, now: u64) -> Result<AccessToken, Error> {
        if !self.validate_credentials(identity, secret) {
            return Err(Error::InvalidCredentials);
        }
        let claims = Claims {
            identity: identity.to_owned(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs().max(1)),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| Error::ResourceInit(format!("token signing failed: {e}")))?;
        Ok(AccessToken { token, claims })
    }

    /// Verify signature, algorithm, and expiry. Every failure collapses to `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &validation).ok().map(|data| data.claims)
    }
}

/// Read claims without checking the signature.
///
/// Only for local pre-checks on the holder's own token; never a trust decision.
pub fn peek_claims(token: &str) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).ok().map(|d| d.claims)
}

/// True if the token expires within `buffer` of now, or cannot be decoded.
pub fn is_expired(token: &str, buffer: Duration) -> bool {
    is_expired_at(token, buffer, epoch_secs())
}

/// [`is_expired`] against an explicit clock (epoch seconds).
pub fn is_expired_at(token: &str, buffer: Duration, now: u64) -> bool {
    match peek_claims(token) {
        Some(claims) => claims.exp <= now.saturating_add(buffer.as_secs()),
        None => true,
    }
}

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
