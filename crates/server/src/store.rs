// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable connection-status records, one per identity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use mongodb::bson::{doc, DateTime, Document};
use mongodb::{Client, Collection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;
use trex_core::queue::BoxFuture;

/// Collection holding one status record per identity.
pub const STATUS_COLLECTION: &str = "agent_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Last known connection state of an identity. Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub system_uuid: String,
    pub org: String,
    pub status: ConnectionStatus,
    pub connected_at: Option<u64>,
    pub last_disconnected: Option<u64>,
}

/// Persists connect/disconnect transitions.
pub trait StatusStore: Send + Sync {
    /// Upsert the identity as connected. `last_disconnected` is only
    /// initialized (to null) when the record is created.
    fn record_connected<'a>(
        &'a self,
        identity: &'a str,
        org: &'a str,
        at: u64,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    /// Mark the identity disconnected if, and only if, it is currently
    /// connected. Returns whether a transition happened.
    fn record_disconnected<'a>(&'a self, identity: &'a str, at: u64)
        -> BoxFuture<'a, anyhow::Result<bool>>;

    fn status<'a>(&'a self, identity: &'a str) -> BoxFuture<'a, anyhow::Result<Option<StatusRecord>>>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

// -- MongoDB ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatusDoc {
    system_uuid: String,
    #[serde(default)]
    org: String,
    status: ConnectionStatus,
    #[serde(default)]
    connected_at: Option<DateTime>,
    #[serde(default)]
    last_disconnected: Option<DateTime>,
}

impl From<StatusDoc> for StatusRecord {
    fn from(doc: StatusDoc) -> Self {
        Self {
            system_uuid: doc.system_uuid,
            org: doc.org,
            status: doc.status,
            connected_at: doc.connected_at.map(to_epoch_ms),
            last_disconnected: doc.last_disconnected.map(to_epoch_ms),
        }
    }
}

fn to_epoch_ms(at: DateTime) -> u64 {
    u64::try_from(at.timestamp_millis()).unwrap_or_default()
}

fn from_epoch_ms(at: u64) -> DateTime {
    DateTime::from_millis(i64::try_from(at).unwrap_or(i64::MAX))
}

/// MongoDB-backed status store.
pub struct MongoStatusStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStatusStore {
    /// Connect and ping the database. An unreachable server fails within
    /// the three-second server-selection timeout.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        info!("connecting to MongoDB at {uri}");

        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            let base = uri.trim_end_matches('/');
            format!("{base}/?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to MongoDB: {e}"))?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| anyhow::anyhow!("MongoDB ping failed: {e}"))?;

        info!("connected to MongoDB database '{db_name}'");
        Ok(Self { collection: db.collection(STATUS_COLLECTION), client })
    }
}

impl StatusStore for MongoStatusStore {
    fn record_connected<'a>(
        &'a self,
        identity: &'a str,
        org: &'a str,
        at: u64,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.collection
                .update_one(
                    doc! { "system_uuid": identity },
                    doc! {
                        "$set": {
                            "system_uuid": identity,
                            "org": org,
                            "status": "connected",
                            "connected_at": from_epoch_ms(at),
                        },
                        "$setOnInsert": { "last_disconnected": null },
                    },
                )
                .upsert(true)
                .await?;
            Ok(())
        })
    }

    fn record_disconnected<'a>(
        &'a self,
        identity: &'a str,
        at: u64,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            let result = self
                .collection
                .update_one(
                    doc! { "system_uuid": identity, "status": "connected" },
                    doc! {
                        "$set": {
                            "status": "disconnected",
                            "last_disconnected": from_epoch_ms(at),
                        }
                    },
                )
                .await?;
            Ok(result.modified_count > 0)
        })
    }

    fn status<'a>(&'a self, identity: &'a str) -> BoxFuture<'a, anyhow::Result<Option<StatusRecord>>> {
        Box::pin(async move {
            let Some(found) = self.collection.find_one(doc! { "system_uuid": identity }).await? else {
                return Ok(None);
            };
            let parsed: StatusDoc = mongodb::bson::from_document(found)?;
            Ok(Some(parsed.into()))
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.client.clone().shutdown().await;
            info!("MongoDB connection closed");
        })
    }
}

// -- In-memory ----------------------------------------------------------------

/// In-process status store used by tests and `memory://` development mode.
///
/// Also records every successful transition in order.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<String, StatusRecord>>,
    transitions: Mutex<Vec<(String, ConnectionStatus)>>,
    fail_writes: AtomicBool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every transition written so far, oldest first.
    pub fn transitions(&self) -> Vec<(String, ConnectionStatus)> {
        self.transitions.lock().clone()
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("status store unavailable");
        }
        Ok(())
    }
}

impl StatusStore for MemoryStatusStore {
    fn record_connected<'a>(
        &'a self,
        identity: &'a str,
        org: &'a str,
        at: u64,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.check_writable()?;
            let mut records = self.records.lock();
            let record = records.entry(identity.to_owned()).or_insert_with(|| StatusRecord {
                system_uuid: identity.to_owned(),
                org: org.to_owned(),
                status: ConnectionStatus::Connected,
                connected_at: None,
                last_disconnected: None,
            });
            record.org = org.to_owned();
            record.status = ConnectionStatus::Connected;
            record.connected_at = Some(at);
            self.transitions.lock().push((identity.to_owned(), ConnectionStatus::Connected));
            Ok(())
        })
    }

    fn record_disconnected<'a>(
        &'a self,
        identity: &'a str,
        at: u64,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            self.check_writable()?;
            let mut records = self.records.lock();
            match records.get_mut(identity) {
                Some(record) if record.status == ConnectionStatus::Connected => {
                    record.status = ConnectionStatus::Disconnected;
                    record.last_disconnected = Some(at);
                    self.transitions.lock().push((identity.to_owned(), ConnectionStatus::Disconnected));
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn status<'a>(&'a self, identity: &'a str) -> BoxFuture<'a, anyhow::Result<Option<StatusRecord>>> {
        Box::pin(async move { Ok(self.records.lock().get(identity).cloned()) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
