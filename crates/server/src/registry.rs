// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-side map of identity to live transport session.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trex_core::{epoch_ms, Error};

use crate::store::StatusStore;

/// Close code sent when a session is cancelled by shutdown or replacement.
const GOING_AWAY: u16 = 1001;

/// A live transport session.
///
/// Cancelling the handle ends its receive loop.
#[derive(Debug)]
pub struct ConnectionHandle {
    session_id: String,
    org: String,
    connected_at: u64,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// `cancel` is usually a child of the server's shutdown token.
    pub fn new(org: impl Into<String>, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            org: org.into(),
            connected_at: epoch_ms(),
            cancel,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Tracks one live session per identity and persists lifecycle transitions.
///
/// Registration is last-writer-wins. Operations on the same identity are
/// serialized across the map update and the status write.
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<String, Arc<ConnectionHandle>>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    store: Arc<dyn StatusStore>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), locks: Mutex::new(HashMap::new()), store }
    }

    fn identity_lock(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(identity.to_owned()).or_default())
    }

    /// Register `handle` for `identity` and persist the connected state.
    ///
    /// A previous session for the identity is cancelled. A failed status
    /// write is logged only.
    pub async fn connect(&self, handle: Arc<ConnectionHandle>, identity: &str, org: &str) {
        let lock = self.identity_lock(identity);
        let _guard = lock.lock().await;

        let previous = self.sessions.write().insert(identity.to_owned(), Arc::clone(&handle));
        if let Some(previous) = previous {
            info!(
                identity,
                old_session = previous.session_id(),
                new_session = handle.session_id(),
                "replacing existing session"
            );
            previous.cancel();
        }
        info!(identity, org, session = handle.session_id(), "agent connected");

        if let Err(e) = self.store.record_connected(identity, org, handle.connected_at()).await {
            warn!(identity, err = %e, "failed to record connected status");
        }
    }

    /// Remove the session for `identity` and persist the disconnected state.
    ///
    /// An unknown identity is logged and reported as
    /// [`Error::UnknownIdentity`] without touching the store.
    pub async fn disconnect(&self, identity: &str) -> Result<(), Error> {
        let lock = self.identity_lock(identity);
        let _guard = lock.lock().await;

        let Some(handle) = self.sessions.write().remove(identity) else {
            warn!(identity, "disconnect for identity with no active connection");
            return Err(Error::UnknownIdentity(identity.to_owned()));
        };
        info!(identity, session = handle.session_id(), "agent disconnected");
        self.persist_disconnected(identity).await;
        Ok(())
    }

    /// Drain frames from `socket` until the peer closes, the socket errors,
    /// or `handle` is cancelled, then release this session exactly once.
    pub async fn receive_loop(
        &self,
        socket: WebSocket,
        handle: Arc<ConnectionHandle>,
        identity: &str,
    ) {
        let (mut ws_tx, mut ws_rx) = socket.split();

        loop {
            tokio::select! {
                _ = handle.cancel.cancelled() => {
                    let frame = CloseFrame { code: GOING_AWAY, reason: "session closed".into() };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            debug!(identity, len = text.len(), "received text frame: {}", text.as_str());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(identity, ?frame, "peer closed transport");
                            break;
                        }
                        None => break,
                        Some(Err(e)) => {
                            debug!(identity, err = %e, "transport receive failed");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }

        self.release(identity, &handle).await;
    }

    /// Disconnect `identity` only if `handle` is still its registered
    /// session. Returns whether the mapping was removed.
    ///
    /// A superseded session leaves the map and the store untouched.
    pub(crate) async fn release(&self, identity: &str, handle: &Arc<ConnectionHandle>) -> bool {
        let lock = self.identity_lock(identity);
        let _guard = lock.lock().await;

        {
            let mut sessions = self.sessions.write();
            match sessions.get(identity) {
                Some(current) if Arc::ptr_eq(current, handle) => {
                    sessions.remove(identity);
                }
                Some(current) => {
                    debug!(
                        identity,
                        session = handle.session_id(),
                        current = current.session_id(),
                        "superseded session ended"
                    );
                    return false;
                }
                None => {
                    debug!(identity, session = handle.session_id(), "session already removed");
                    return false;
                }
            }
        }
        info!(identity, session = handle.session_id(), "agent disconnected");
        self.persist_disconnected(identity).await;
        true
    }

    async fn persist_disconnected(&self, identity: &str) {
        match self.store.record_disconnected(identity, epoch_ms()).await {
            Ok(true) => {}
            Ok(false) => debug!(identity, "status was not connected, left unchanged"),
            Err(e) => warn!(identity, err = %e, "failed to record disconnected status"),
        }
    }

    /// Cancel every live session.
    pub fn close_all(&self) {
        let sessions = self.sessions.read();
        for handle in sessions.values() {
            handle.cancel();
        }
        if !sessions.is_empty() {
            info!(count = sessions.len(), "closing all agent sessions");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<Arc<ConnectionHandle>> {
        self.sessions.read().get(identity).cloned()
    }

    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
