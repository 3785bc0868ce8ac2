// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS JetStream broker adapter.
//!
//! A logical channel is a JetStream context whose subjects are prefixed with
//! the channel name. A durable queue is a file-backed stream named after the
//! queue and bound to `{channel}.{queue}`.

use std::sync::Arc;

use async_nats::jetstream;
use tracing::info;

use super::{BoxFuture, BrokerChannel, BrokerConnection, BrokerConnector, QueueHandle};

/// Connection settings for a NATS server.
#[derive(Debug, Clone)]
pub struct NatsConnector {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl NatsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), user: None, password: None }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

impl BrokerConnector for NatsConnector {
    fn connect(&self) -> BoxFuture<'_, anyhow::Result<Box<dyn BrokerConnection>>> {
        Box::pin(async move {
            let opts = match (&self.user, &self.password) {
                (Some(user), Some(password)) => {
                    async_nats::ConnectOptions::with_user_and_password(user.clone(), password.clone())
                }
                _ => async_nats::ConnectOptions::new(),
            };

            info!(url = %self.url, "connecting to NATS");
            let client = opts.connect(self.url.as_str()).await?;
            let conn: Box<dyn BrokerConnection> = Box::new(NatsConnection { client });
            Ok(conn)
        })
    }
}

struct NatsConnection {
    client: async_nats::Client,
}

impl BrokerConnection for NatsConnection {
    fn open_channel(&self, name: &str) -> BoxFuture<'_, anyhow::Result<Arc<dyn BrokerChannel>>> {
        let name = name.to_owned();
        Box::pin(async move {
            let context = jetstream::new(self.client.clone());
            let channel: Arc<dyn BrokerChannel> = Arc::new(NatsChannel { name, context });
            Ok(channel)
        })
    }

    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.client.flush().await?;
            Ok(())
        })
    }
}

struct NatsChannel {
    name: String,
    context: jetstream::Context,
}

impl BrokerChannel for NatsChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn declare_queue(&self, name: &str, durable: bool) -> BoxFuture<'_, anyhow::Result<QueueHandle>> {
        let name = name.to_owned();
        Box::pin(async move {
            let address = format!("{}.{name}", self.name);
            let storage = if durable {
                jetstream::stream::StorageType::File
            } else {
                jetstream::stream::StorageType::Memory
            };
            self.context
                .get_or_create_stream(jetstream::stream::Config {
                    name: name.clone(),
                    subjects: vec![address.clone()],
                    storage,
                    ..Default::default()
                })
                .await
                .map_err(|e| anyhow::anyhow!("failed to declare {name}: {e}"))?;
            Ok(QueueHandle { name, address, durable })
        })
    }
}
