// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! trex agent: authenticates to the server, holds a persistent transport,
//! and provisions its broker queues.

pub mod config;
pub mod identity;
pub mod session;
pub mod token_client;
pub mod transport;

use std::sync::Arc;

use tracing::info;
use trex_core::queue::memory::MemoryBroker;
use trex_core::queue::nats::NatsConnector;
use trex_core::queue::{BrokerConnector, QueueProvisioner};

use crate::config::AgentConfig;
use crate::identity::{HardwareIdentityProvider, IdentitySource};
use crate::session::SessionClient;
use crate::token_client::HttpTokenIssuer;
use crate::transport::WsConnector;

/// Run the agent until SIGINT/SIGTERM or a fatal session error.
pub async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let identity = IdentitySource::select(config.identity.as_deref()).identity()?;
    info!(identity = %identity, org = %config.org, server = %config.http_base(), "starting agent");

    let connector: Arc<dyn BrokerConnector> = if config.uses_memory_broker() {
        Arc::new(MemoryBroker::new())
    } else {
        Arc::new(
            NatsConnector::new(&config.broker_url)
                .with_credentials(&config.broker_user, &config.broker_pass),
        )
    };

    let mut client = SessionClient::new(
        config.session_settings(identity),
        Arc::new(HttpTokenIssuer::new(&config.http_base())?),
        Arc::new(WsConnector::new(config.ws_base())),
        Arc::new(QueueProvisioner::new(connector)),
    );
    client.running().stop_on_signals();

    client.run().await?;
    Ok(())
}
