// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message-queue provisioning: one shared broker connection per process,
//! named logical channels, and durable per-identity queues.

pub mod memory;
pub mod nats;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Error;

/// Logical channel carrying commands/actions.
pub const ACTION_CHANNEL: &str = "action";
/// Logical channel carrying telemetry.
pub const TELEMETRY_CHANNEL: &str = "telemetry";
/// Logical channel carrying file streams.
pub const FILESTREAM_CHANNEL: &str = "filestream";

/// Every logical channel, in open order.
pub const CHANNELS: [&str; 3] = [ACTION_CHANNEL, TELEMETRY_CHANNEL, FILESTREAM_CHANNEL];

/// Per-identity queue purposes and the channel each one lives on.
pub const QUEUE_PURPOSES: [(&str, &str); 4] = [
    ("action", ACTION_CHANNEL),
    ("proc_telemetry", TELEMETRY_CHANNEL),
    ("filestream_in", FILESTREAM_CHANNEL),
    ("filestream_out", FILESTREAM_CHANNEL),
];

/// Queue name for a purpose and identity: `{purpose}_{identity}`.
pub fn queue_name(purpose: &str, identity: &str) -> String {
    format!("{purpose}_{identity}")
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A declared queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueHandle {
    pub name: String,
    /// Broker address messages for this queue are published to.
    pub address: String,
    pub durable: bool,
}

/// Opens connections to a message broker.
pub trait BrokerConnector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, anyhow::Result<Box<dyn BrokerConnection>>>;
}

/// A live broker connection.
pub trait BrokerConnection: Send + Sync {
    fn open_channel(&self, name: &str) -> BoxFuture<'_, anyhow::Result<Arc<dyn BrokerChannel>>>;

    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// A named logical channel on a broker connection.
pub trait BrokerChannel: Send + Sync {
    fn name(&self) -> &str;

    fn declare_queue(&self, name: &str, durable: bool) -> BoxFuture<'_, anyhow::Result<QueueHandle>>;
}

/// Channels and queues to provision on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLayout {
    pub channels: Vec<String>,
    /// `(key, queue name, channel)` triples; `key` is the lookup name.
    pub queues: Vec<(String, String, String)>,
}

impl QueueLayout {
    /// All channels and the four per-identity queues.
    pub fn for_identity(identity: &str) -> Self {
        Self {
            channels: CHANNELS.iter().map(|c| (*c).to_owned()).collect(),
            queues: QUEUE_PURPOSES
                .iter()
                .map(|(purpose, channel)| {
                    ((*purpose).to_owned(), queue_name(purpose, identity), (*channel).to_owned())
                })
                .collect(),
        }
    }

    /// All channels, no queues.
    pub fn channels_only() -> Self {
        Self { channels: CHANNELS.iter().map(|c| (*c).to_owned()).collect(), queues: vec![] }
    }
}

struct Provisioned {
    connection: Box<dyn BrokerConnection>,
    channels: HashMap<String, Arc<dyn BrokerChannel>>,
    queues: HashMap<String, QueueHandle>,
}

/// Lazily opens and caches the process's broker connection.
///
/// Construct once and share via `Arc`. Concurrent first-time `connect` calls
/// are serialized so exactly one underlying connection is ever opened.
pub struct QueueProvisioner {
    connector: Arc<dyn BrokerConnector>,
    init: tokio::sync::Mutex<()>,
    state: parking_lot::RwLock<Option<Provisioned>>,
}

impl QueueProvisioner {
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self { connector, init: tokio::sync::Mutex::new(()), state: parking_lot::RwLock::new(None) }
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().is_some()
    }

    /// Open channels and declare this identity's durable queues.
    pub async fn connect(&self, identity: &str) -> Result<(), Error> {
        self.connect_layout(QueueLayout::for_identity(identity)).await
    }

    /// Open channels only (server side).
    pub async fn connect_channels(&self) -> Result<(), Error> {
        self.connect_layout(QueueLayout::channels_only()).await
    }

    /// Provision `layout`, or do nothing if already connected.
    ///
    /// The provisioner only reports connected after every channel and queue
    /// is in place; on any failure it stays disconnected and the error is not
    /// retried here.
    pub async fn connect_layout(&self, layout: QueueLayout) -> Result<(), Error> {
        let _guard = self.init.lock().await;
        if self.is_connected() {
            debug!("broker already connected, reusing");
            return Ok(());
        }

        let connection = self
            .connector
            .connect()
            .await
            .map_err(|e| Error::ResourceInit(format!("broker connection failed: {e:#}")))?;

        match provision(connection.as_ref(), &layout).await {
            Ok((channels, queues)) => {
                info!(
                    channels = channels.len(),
                    queues = queues.len(),
                    "connected to broker and declared channels/queues"
                );
                *self.state.write() = Some(Provisioned { connection, channels, queues });
                Ok(())
            }
            Err(e) => {
                warn!("broker provisioning failed: {e:#}");
                if let Err(close_err) = connection.close().await {
                    debug!(err = %close_err, "closing half-open broker connection failed");
                }
                Err(Error::ResourceInit(format!("broker provisioning failed: {e:#}")))
            }
        }
    }

    /// Look up a logical channel. A miss is logged and returns `None`.
    pub fn channel(&self, name: &str) -> Option<Arc<dyn BrokerChannel>> {
        let found = self.state.read().as_ref().and_then(|p| p.channels.get(name).cloned());
        if found.is_none() {
            warn!(channel = name, "requested broker channel does not exist");
        }
        found
    }

    /// Look up a declared queue by purpose. A miss is logged and returns `None`.
    pub fn queue(&self, name: &str) -> Option<QueueHandle> {
        let found = self.state.read().as_ref().and_then(|p| p.queues.get(name).cloned());
        if found.is_none() {
            warn!(queue = name, "requested broker queue does not exist");
        }
        found
    }

    /// Close the shared connection. Safe to call repeatedly or before connect.
    pub async fn close(&self) {
        let _guard = self.init.lock().await;
        let Some(provisioned) = self.state.write().take() else {
            return;
        };
        match provisioned.connection.close().await {
            Ok(()) => info!("broker connection closed"),
            Err(e) => warn!(err = %e, "failed to close broker connection"),
        }
    }
}

type ProvisionedMaps = (HashMap<String, Arc<dyn BrokerChannel>>, HashMap<String, QueueHandle>);

async fn provision(
    connection: &dyn BrokerConnection,
    layout: &QueueLayout,
) -> anyhow::Result<ProvisionedMaps> {
    let mut channels = HashMap::new();
    for name in &layout.channels {
        let channel = connection.open_channel(name).await?;
        channels.insert(name.clone(), channel);
    }

    let mut queues = HashMap::new();
    for (key, queue, channel_name) in &layout.queues {
        let channel = channels
            .get(channel_name)
            .ok_or_else(|| anyhow::anyhow!("queue {queue} references unknown channel {channel_name}"))?;
        let handle = channel.declare_queue(queue, true).await?;
        queues.insert(key.clone(), handle);
    }

    Ok((channels, queues))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
