// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! trex server: issues access tokens, admits agent WebSocket sessions, and
//! tracks their connection status.

pub mod config;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use trex_core::shutdown::RunningFlag;

use crate::config::ServerConfig;
use crate::state::ServerState;
use crate::transport::build_router;

/// Run the server until SIGINT/SIGTERM.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let running = RunningFlag::new();
    running.stop_on_signals();

    let state = Arc::new(ServerState::connect(&config, running.token().clone()).await?);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("trex server listening on {addr}");

    serve(state, listener).await
}

/// Serve on an already bound listener until `state.shutdown` fires, then
/// close sessions, the broker connection, and the status store.
pub async fn serve(state: Arc<ServerState>, listener: TcpListener) -> anyhow::Result<()> {
    let router = build_router(Arc::clone(&state));
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
        .await;

    state.registry.close_all();
    state.queues.close().await;
    state.store.close().await;
    info!("trex server stopped");

    result?;
    Ok(())
}
