// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the trex server.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::ServerState;

/// Build the axum `Router` with all server routes.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(http::healthcheck))
        .route("/auth/get_token", post(http::get_token))
        .route("/auth/ws/{system_uuid}", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
