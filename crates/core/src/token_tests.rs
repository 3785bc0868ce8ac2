// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use jsonwebtoken::Algorithm;

use super::*;

const SECRET: &str = "treacle_authpass";

fn broker_with(key: &str, algorithm: Algorithm) -> anyhow::Result<CredentialBroker> {
    CredentialBroker::new(BrokerSettings {
        agent_secret: SECRET.to_owned(),
        signing_key: key.to_owned(),
        algorithm,
        ttl: DEFAULT_TTL,
    })
}

fn broker() -> anyhow::Result<CredentialBroker> {
    broker_with("test-signing-key-that-is-long-enough", Algorithm::HS256)
}

#[test]
fn issue_embeds_identity_and_one_hour_expiry() -> anyhow::Result<()> {
    let broker = broker()?;
    let now = epoch_secs();
    let issued = broker.issue_at("abc123", SECRET, now)?;

    assert_eq!(issued.claims.identity, "abc123");
    assert_eq!(issued.claims.exp, now + 3600);
    assert!(issued.claims.exp > issued.claims.iat);

    assert!(!is_expired_at(&issued.token, Duration::from_secs(1), now));
    assert!(is_expired_at(&issued.token, Duration::from_secs(1), now + 3601));
    Ok(())
}

#[test]
fn fresh_token_is_not_expired_against_wall_clock() -> anyhow::Result<()> {
    let issued = broker()?.issue("abc123", SECRET)?;
    assert!(!is_expired(&issued.token, Duration::from_secs(1)));
    Ok(())
}

#[test]
fn wrong_secret_is_rejected() -> anyhow::Result<()> {
    let result = broker()?.issue("abc123", "nope");
    assert!(matches!(result, Err(Error::InvalidCredentials)));
    Ok(())
}

#[test]
fn verify_round_trips_claims() -> anyhow::Result<()> {
    let broker = broker()?;
    let issued = broker.issue("abc123", SECRET)?;
    let claims = broker.verify(&issued.token).ok_or_else(|| anyhow::anyhow!("rejected"))?;
    assert_eq!(claims, issued.claims);
    Ok(())
}

#[test]
fn verify_rejects_expired_token() -> anyhow::Result<()> {
    let broker = broker()?;
    let issued = broker.issue_at("abc123", SECRET, epoch_secs() - 7200)?;
    assert!(broker.verify(&issued.token).is_none());
    Ok(())
}

#[test]
fn verify_rejects_foreign_signature() -> anyhow::Result<()> {
    let ours = broker()?;
    let theirs = broker_with("some-other-signing-key-entirely", Algorithm::HS256)?;
    let forged = theirs.issue("abc123", SECRET)?;
    assert!(ours.verify(&forged.token).is_none());
    Ok(())
}

#[test]
fn verify_rejects_other_algorithm() -> anyhow::Result<()> {
    let key = "test-signing-key-that-is-long-enough";
    let hs512 = broker_with(key, Algorithm::HS512)?.issue("abc123", SECRET)?;
    assert!(broker_with(key, Algorithm::HS256)?.verify(&hs512.token).is_none());
    Ok(())
}

#[yare::parameterized(
    empty = { "" },
    garbage = { "not-a-token" },
    two_parts = { "abc.def" },
)]
fn malformed_tokens(token: &str) {
    assert!(is_expired(token, Duration::from_secs(1)));
    assert!(peek_claims(token).is_none());
}

#[test]
fn malformed_token_fails_verify() -> anyhow::Result<()> {
    assert!(broker()?.verify("not-a-token").is_none());
    Ok(())
}

#[test]
fn peek_ignores_signature() -> anyhow::Result<()> {
    let other = broker_with("some-other-signing-key-entirely", Algorithm::HS384)?;
    let issued = other.issue("abc123", SECRET)?;
    assert_eq!(peek_claims(&issued.token), Some(issued.claims));
    Ok(())
}

#[test]
fn expiry_boundary_counts_as_expired() -> anyhow::Result<()> {
    let now = 1_700_000_000;
    let issued = broker()?.issue_at("abc123", SECRET, now)?;
    let exp = issued.claims.exp;
    assert!(is_expired_at(&issued.token, Duration::from_secs(5), exp - 5));
    assert!(!is_expired_at(&issued.token, Duration::from_secs(5), exp - 6));
    Ok(())
}

#[yare::parameterized(
    empty_key = { "", Algorithm::HS256 },
    asymmetric = { "key", Algorithm::RS256 },
)]
fn invalid_settings(key: &str, algorithm: Algorithm) {
    assert!(broker_with(key, algorithm).is_err());
}

#[test]
fn expiry_saturates_at_the_far_end_of_time() -> anyhow::Result<()> {
    let issued = broker()?.issue_at("abc123", SECRET, u64::MAX - 10)?;
    assert_eq!(issued.claims.exp, u64::MAX);
    assert!(!is_expired_at(&issued.token, Duration::from_secs(1), u64::MAX - 10));
    Ok(())
}
