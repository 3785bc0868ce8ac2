// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of `POST /auth/get_token`.

use std::sync::Once;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use trex_core::queue::BoxFuture;
use trex_core::Error;

/// Requests access tokens from the server.
pub trait TokenIssuer: Send + Sync {
    /// One token request. Network failures and server errors are
    /// [`Error::TransientNetwork`]; a rejected secret is
    /// [`Error::InvalidCredentials`].
    fn request_token<'a>(&'a self, identity: &'a str, password: &'a str)
        -> BoxFuture<'a, Result<String, Error>>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static CRYPTO: Once = Once::new();

/// Install the ring TLS provider for reqwest once per process.
pub fn ensure_crypto() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    system_uuid: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    access_token: String,
}

/// [`TokenIssuer`] over HTTP.
pub struct HttpTokenIssuer {
    url: String,
    client: reqwest::Client,
}

impl HttpTokenIssuer {
    /// `base_url` is the server root, e.g. `http://10.0.0.5:8000`.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        ensure_crypto();
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { url: format!("{}/auth/get_token", base_url.trim_end_matches('/')), client })
    }

    async fn request(&self, identity: &str, password: &str) -> Result<String, Error> {
        let resp = self
            .client
            .post(&self.url)
            .json(&TokenRequest { system_uuid: identity, password })
            .send()
            .await
            .map_err(|e| Error::TransientNetwork(e.to_string()))?;

        let status = resp.status();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        {
            return Err(Error::InvalidCredentials);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::TransientNetwork(format!("token request failed ({status}): {text}")));
        }

        let body: TokenEnvelope =
            resp.json().await.map_err(|e| Error::TransientNetwork(e.to_string()))?;
        body.data.map(|d| d.access_token).ok_or_else(|| {
            Error::TransientNetwork(format!("token response carried no token: {}", body.message))
        })
    }
}

impl TokenIssuer for HttpTokenIssuer {
    fn request_token<'a>(
        &'a self,
        identity: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<String, Error>> {
        Box::pin(self.request(identity, password))
    }
}

#[cfg(test)]
#[path = "token_client_tests.rs"]
mod tests;
