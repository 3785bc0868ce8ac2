// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use trex_core::queue::memory::MemoryBroker;
use trex_core::queue::nats::NatsConnector;
use trex_core::queue::{BrokerConnector, QueueProvisioner};
use trex_core::token::CredentialBroker;
use trex_core::Error;

use crate::config::ServerConfig;
use crate::registry::ConnectionRegistry;
use crate::store::{MemoryStatusStore, MongoStatusStore, StatusStore};

/// Shared server state.
pub struct ServerState {
    pub broker: CredentialBroker,
    pub registry: Arc<ConnectionRegistry>,
    pub queues: Arc<QueueProvisioner>,
    pub store: Arc<dyn StatusStore>,
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(
        broker: CredentialBroker,
        queues: Arc<QueueProvisioner>,
        store: Arc<dyn StatusStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            registry: Arc::new(ConnectionRegistry::new(Arc::clone(&store))),
            queues,
            store,
            shutdown,
        }
    }

    /// Build state from config, acquiring the status store and the broker.
    ///
    /// Either resource being unreachable is a [`Error::ResourceInit`].
    pub async fn connect(config: &ServerConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let broker = CredentialBroker::new(config.broker_settings()?)?;

        let store: Arc<dyn StatusStore> = if config.uses_memory_store() {
            info!("using in-memory status store");
            Arc::new(MemoryStatusStore::new())
        } else {
            let store = MongoStatusStore::connect(&config.mongo_url, &config.mongo_db)
                .await
                .map_err(|e| Error::ResourceInit(format!("{e:#}")))?;
            Arc::new(store)
        };

        let connector: Arc<dyn BrokerConnector> = if config.uses_memory_broker() {
            info!("using in-memory message broker");
            Arc::new(MemoryBroker::new())
        } else {
            Arc::new(
                NatsConnector::new(&config.broker_url)
                    .with_credentials(&config.broker_user, &config.broker_pass),
            )
        };
        let queues = Arc::new(QueueProvisioner::new(connector));
        if let Err(e) = queues.connect_channels().await {
            store.close().await;
            return Err(e.into());
        }

        Ok(Self::new(broker, queues, store, shutdown))
    }
}
