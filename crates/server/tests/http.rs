// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API tests.
//!
//! Uses `axum_test::TestServer`, no real TCP needed.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use jsonwebtoken::Algorithm;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use trex_core::queue::memory::MemoryBroker;
use trex_core::queue::QueueProvisioner;
use trex_core::token::{self, BrokerSettings, CredentialBroker, DEFAULT_TTL};

use trex_server::registry::ConnectionHandle;
use trex_server::state::ServerState;
use trex_server::store::MemoryStatusStore;
use trex_server::transport::build_router;

const SECRET: &str = "treacle_authpass";

fn test_state() -> anyhow::Result<Arc<ServerState>> {
    let broker = CredentialBroker::new(BrokerSettings {
        agent_secret: SECRET.to_owned(),
        signing_key: "http-test-signing-key".to_owned(),
        algorithm: Algorithm::HS256,
        ttl: DEFAULT_TTL,
    })?;
    let queues = Arc::new(QueueProvisioner::new(Arc::new(MemoryBroker::new())));
    Ok(Arc::new(ServerState::new(
        broker,
        queues,
        Arc::new(MemoryStatusStore::new()),
        CancellationToken::new(),
    )))
}

fn test_server(state: Arc<ServerState>) -> anyhow::Result<TestServer> {
    TestServer::new(build_router(state)).map_err(|e| anyhow::anyhow!("test server: {e}"))
}

#[tokio::test]
async fn healthcheck_reports_agent_count() -> anyhow::Result<()> {
    let state = test_state()?;
    state
        .registry
        .connect(ConnectionHandle::new("orgX", CancellationToken::new()), "abc123", "orgX")
        .await;

    let server = test_server(state)?;
    let resp = server.get("/").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "healthy");
    assert_eq!(body["data"]["agents"], 1);
    Ok(())
}

#[tokio::test]
async fn get_token_issues_bearer_token() -> anyhow::Result<()> {
    let state = test_state()?;
    let server = test_server(Arc::clone(&state))?;

    let resp = server
        .post("/auth/get_token")
        .json(&json!({ "system_uuid": "ABC123", "password": SECRET }))
        .await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["token_type"], "bearer");
    let access_token =
        body["data"]["access_token"].as_str().ok_or_else(|| anyhow::anyhow!("no token"))?;
    let claims = state.broker.verify(access_token).ok_or_else(|| anyhow::anyhow!("rejected"))?;
    assert_eq!(claims.identity, "abc123");
    assert!(!token::is_expired(access_token, std::time::Duration::from_secs(1)));
    Ok(())
}

#[tokio::test]
async fn get_token_rejects_wrong_password() -> anyhow::Result<()> {
    let server = test_server(test_state()?)?;

    let resp = server
        .post("/auth/get_token")
        .json(&json!({ "system_uuid": "abc123", "password": "wrong" }))
        .expect_failure()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["data"], json!({}));
    Ok(())
}

#[tokio::test]
async fn get_token_rejects_malformed_body() -> anyhow::Result<()> {
    let server = test_server(test_state()?)?;

    let resp = server
        .post("/auth/get_token")
        .json(&json!({ "system_uuid": "abc123" }))
        .expect_failure()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "error");
    Ok(())
}

#[tokio::test]
async fn get_token_rejects_blank_identity() -> anyhow::Result<()> {
    let server = test_server(test_state()?)?;

    let resp = server
        .post("/auth/get_token")
        .json(&json!({ "system_uuid": "  ", "password": SECRET }))
        .expect_failure()
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}
