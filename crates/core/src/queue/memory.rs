// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process broker used by tests and `memory://` development mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{BoxFuture, BrokerChannel, BrokerConnection, BrokerConnector, QueueHandle};

#[derive(Default)]
struct Inner {
    connects: AtomicUsize,
    closes: AtomicUsize,
    fail_connect: AtomicBool,
    fail_queue: Mutex<Option<String>>,
    connect_delay: Mutex<Duration>,
    declared: Mutex<Vec<QueueHandle>>,
}

/// Broker that keeps declarations in memory and counts connection lifecycle.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connection attempts fail.
    pub fn fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make declaring the named queue fail.
    pub fn fail_queue(&self, name: Option<&str>) {
        *self.inner.fail_queue.lock() = name.map(str::to_owned);
    }

    /// Delay each connection attempt (to widen race windows in tests).
    pub fn connect_delay(&self, delay: Duration) {
        *self.inner.connect_delay.lock() = delay;
    }

    pub fn connections_opened(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    pub fn declared_queues(&self) -> Vec<QueueHandle> {
        self.inner.declared.lock().clone()
    }
}

impl BrokerConnector for MemoryBroker {
    fn connect(&self) -> BoxFuture<'_, anyhow::Result<Box<dyn BrokerConnection>>> {
        Box::pin(async move {
            let delay = *self.inner.connect_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.inner.fail_connect.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            self.inner.connects.fetch_add(1, Ordering::SeqCst);
            let conn: Box<dyn BrokerConnection> =
                Box::new(MemoryConnection { inner: Arc::clone(&self.inner) });
            Ok(conn)
        })
    }
}

struct MemoryConnection {
    inner: Arc<Inner>,
}

impl BrokerConnection for MemoryConnection {
    fn open_channel(&self, name: &str) -> BoxFuture<'_, anyhow::Result<Arc<dyn BrokerChannel>>> {
        let name = name.to_owned();
        Box::pin(async move {
            let channel: Arc<dyn BrokerChannel> =
                Arc::new(MemoryChannel { name, inner: Arc::clone(&self.inner) });
            Ok(channel)
        })
    }

    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.inner.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct MemoryChannel {
    name: String,
    inner: Arc<Inner>,
}

impl BrokerChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn declare_queue(&self, name: &str, durable: bool) -> BoxFuture<'_, anyhow::Result<QueueHandle>> {
        let name = name.to_owned();
        Box::pin(async move {
            if self.inner.fail_queue.lock().as_deref() == Some(name.as_str()) {
                anyhow::bail!("declare {name} refused");
            }
            let handle =
                QueueHandle { address: format!("{}.{name}", self.name), name, durable };
            self.inner.declared.lock().push(handle.clone());
            Ok(handle)
        })
    }
}
