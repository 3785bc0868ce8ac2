// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent WebSocket endpoint and its access gate.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, warn};
use trex_core::token::CredentialBroker;
use trex_core::Identity;

use crate::envelope::Envelope;
use crate::error::CloseCode;
use crate::registry::ConnectionHandle;
use crate::state::ServerState;

/// Query parameters for the agent WS upgrade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentWsQuery {
    pub token: Option<String>,
    pub org: Option<String>,
}

/// Decide whether a handshake may register.
///
/// The token must verify and name `identity`, and `org` must be non-empty.
/// Returns the org on success.
pub fn admit(
    broker: &CredentialBroker,
    identity: &str,
    token: Option<&str>,
    org: Option<&str>,
) -> Result<String, CloseCode> {
    let claims = token.and_then(|t| broker.verify(t)).ok_or(CloseCode::InvalidToken)?;
    if claims.identity != identity {
        return Err(CloseCode::InvalidToken);
    }
    match org.map(str::trim) {
        Some(org) if !org.is_empty() => Ok(org.to_owned()),
        _ => Err(CloseCode::MissingOrg),
    }
}

/// `GET /auth/ws/{system_uuid}?token=..&org=..`
pub async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    Path(system_uuid): Path<String>,
    Query(query): Query<AgentWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = Identity::normalize(&system_uuid)
        .map(|id| id.as_str().to_owned())
        .unwrap_or_default();
    let admitted =
        admit(&state.broker, &identity, query.token.as_deref(), query.org.as_deref());

    ws.on_upgrade(move |socket| async move {
        match admitted {
            Ok(org) => handle_agent(socket, state, identity, org).await,
            Err(code) => reject(socket, &identity, code).await,
        }
    })
}

async fn handle_agent(mut socket: WebSocket, state: Arc<ServerState>, identity: String, org: String) {
    let handle = ConnectionHandle::new(org.clone(), state.shutdown.child_token());
    state.registry.connect(Arc::clone(&handle), &identity, &org).await;

    match serde_json::to_string(&Envelope::admitted(handle.session_id())) {
        Ok(frame) => {
            if let Err(e) = socket.send(Message::Text(frame.into())).await {
                debug!(identity, err = %e, "failed to send admission frame");
            }
        }
        Err(e) => warn!(identity, err = %e, "failed to encode admission frame"),
    }

    state.registry.receive_loop(socket, handle, &identity).await;
}

async fn reject(mut socket: WebSocket, identity: &str, code: CloseCode) {
    warn!(identity, code = code.code(), "rejecting agent transport: {}", code.reason());
    let frame = CloseFrame { code: code.code(), reason: code.reason().into() };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
