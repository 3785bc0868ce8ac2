// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests: a real session client against the real server.

use std::sync::Arc;
use std::time::Duration;

use trex_agent::session::SessionState;
use trex_agent::token_client::{HttpTokenIssuer, TokenIssuer};
use trex_core::Error;
use trex_server::store::{ConnectionStatus, StatusStore};
use trex_specs::{eventually, ServerHarness, SECRET};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn session_becomes_active_and_disconnects_on_stop() -> anyhow::Result<()> {
    let server = ServerHarness::start().await?;
    let (mut client, agent_broker) = server.client("ABC123", SECRET)?;
    let flag = client.running().clone();
    let mut states = client.subscribe();

    let task = tokio::spawn(async move {
        let result = client.run().await;
        (result, client)
    });
    tokio::time::timeout(TIMEOUT, states.wait_for(|s| *s == SessionState::Active)).await??;

    let registry = Arc::clone(&server.state.registry);
    assert!(eventually(TIMEOUT, || registry.get("abc123").is_some()).await);
    let record = server.store.status("abc123").await?.ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(record.status, ConnectionStatus::Connected);
    assert_eq!(record.org, "orgX");
    assert_eq!(agent_broker.declared_queues().len(), 4);

    flag.stop();
    let (result, client) = tokio::time::timeout(TIMEOUT, task).await??;
    result?;
    assert_eq!(client.state(), SessionState::Terminated);
    assert_eq!(agent_broker.connections_closed(), 1);

    assert!(eventually(TIMEOUT, || registry.is_empty()).await);
    let store = Arc::clone(&server.store);
    assert!(eventually(TIMEOUT, || store.transitions().len() == 2).await);
    let record = server.store.status("abc123").await?.ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(record.status, ConnectionStatus::Disconnected);
    assert!(record.connected_at.is_some());
    assert!(record.last_disconnected.is_some());

    server.stop().await
}

#[tokio::test]
async fn wrong_secret_terminates_without_registering() -> anyhow::Result<()> {
    let server = ServerHarness::start().await?;
    let (mut client, _) = server.client("abc123", "not-the-secret")?;

    let result = tokio::time::timeout(TIMEOUT, client.run()).await?;

    assert!(matches!(result, Err(Error::InvalidCredentials)));
    assert_eq!(client.state(), SessionState::Terminated);
    assert!(server.state.registry.is_empty());
    assert!(server.store.transitions().is_empty());
    server.stop().await
}

#[tokio::test]
async fn session_reconnects_after_server_drops_it() -> anyhow::Result<()> {
    let server = ServerHarness::start().await?;
    let (mut client, _) = server.client("abc123", SECRET)?;
    let flag = client.running().clone();
    let task = tokio::spawn(async move { client.run().await });

    let registry = Arc::clone(&server.state.registry);
    assert!(eventually(TIMEOUT, || registry.get("abc123").is_some()).await);
    let first = registry.get("abc123").ok_or_else(|| anyhow::anyhow!("not registered"))?;
    first.cancel();

    let first_id = first.session_id().to_owned();
    assert!(
        eventually(TIMEOUT, || registry
            .get("abc123")
            .is_some_and(|h| h.session_id() != first_id))
        .await
    );

    flag.stop();
    tokio::time::timeout(TIMEOUT, task).await???;
    server.stop().await
}

#[tokio::test]
async fn rejected_transport_never_goes_active() -> anyhow::Result<()> {
    let server = ServerHarness::start().await?;
    let (mut client, agent_broker) = server.client_with_org("abc123", SECRET, "")?;
    let flag = client.running().clone();
    let mut states = client.subscribe();
    let seen = tokio::spawn(async move {
        let mut seen = vec![];
        while states.changed().await.is_ok() {
            seen.push(*states.borrow_and_update());
        }
        seen
    });

    let task = tokio::spawn(async move { client.run().await });
    // First attempt at 0s, second after a 2s backoff.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    flag.stop();
    tokio::time::timeout(TIMEOUT, task).await???;

    let seen = tokio::time::timeout(TIMEOUT, seen).await??;
    assert!(seen.contains(&SessionState::Reconnecting));
    assert!(!seen.contains(&SessionState::Active));
    assert_eq!(seen.last(), Some(&SessionState::Terminated));
    assert_eq!(agent_broker.connections_opened(), 0);
    assert!(server.state.registry.is_empty());
    assert!(server.store.transitions().is_empty());
    server.stop().await
}

#[tokio::test]
async fn http_issuer_maps_server_responses() -> anyhow::Result<()> {
    let server = ServerHarness::start().await?;
    let issuer = HttpTokenIssuer::new(&server.http_base())?;

    let token = issuer.request_token("abc123", SECRET).await?;
    let claims = server.state.broker.verify(&token).ok_or_else(|| anyhow::anyhow!("rejected"))?;
    assert_eq!(claims.identity, "abc123");

    let rejected = issuer.request_token("abc123", "wrong").await;
    assert!(matches!(rejected, Err(Error::InvalidCredentials)));

    let addr = server.addr;
    server.stop().await?;
    let unreachable = HttpTokenIssuer::new(&format!("http://{addr}"))?;
    let result = unreachable.request_token("abc123", SECRET).await;
    assert!(matches!(result, Err(Error::TransientNetwork(_))));
    Ok(())
}
