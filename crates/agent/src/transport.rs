// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent side of the persistent WebSocket transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trex_core::queue::BoxFuture;
use trex_core::Error;

/// How long the server has to admit or reject a fresh transport.
pub const ADMISSION_TIMEOUT: Duration = Duration::from_secs(10);

/// An open transport session.
pub trait Transport: Send + Sync {
    fn is_open(&self) -> bool;

    /// Close the transport. Safe to call more than once.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Opens transports carrying an access token.
pub trait TransportConnector: Send + Sync {
    fn open<'a>(
        &'a self,
        identity: &'a str,
        token: &'a str,
        org: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn Transport>, Error>>;
}

/// Connects to `{base}/auth/ws/{identity}?token=..&org=..`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    /// `base_url` is e.g. `ws://10.0.0.5:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub fn url(&self, identity: &str, token: &str, org: &str) -> Result<String, Error> {
        let path = format!("{}/auth/ws/{identity}", self.base_url.trim_end_matches('/'));
        reqwest::Url::parse_with_params(&path, &[("token", token), ("org", org)])
            .map(|u| u.to_string())
            .map_err(|e| Error::TransientNetwork(format!("invalid transport url: {e}")))
    }
}

impl TransportConnector for WsConnector {
    fn open<'a>(
        &'a self,
        identity: &'a str,
        token: &'a str,
        org: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn Transport>, Error>> {
        Box::pin(async move {
            let url = self.url(identity, token, org)?;
            let (mut ws, _) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| Error::TransientNetwork(format!("transport connect failed: {e}")))?;
            let admitted = tokio::time::timeout(ADMISSION_TIMEOUT, await_admission(&mut ws)).await;
            let session = match admitted {
                Ok(result) => result?,
                Err(_) => {
                    let _ = ws.close(None).await;
                    return Err(Error::TransientNetwork("no admission from server".to_owned()));
                }
            };
            info!(identity, session = %session, "transport connected");
            let transport: Box<dyn Transport> = Box::new(WsTransport::spawn(ws, identity.to_owned()));
            Ok(transport)
        })
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Deserialize)]
struct Admission {
    status: String,
    #[serde(default)]
    data: AdmissionData,
}

#[derive(Debug, Default, Deserialize)]
struct AdmissionData {
    #[serde(default)]
    session_id: String,
}

/// Wait for the server's first frame. An `ok` envelope admits the
/// transport; a close frame means the handshake was rejected.
async fn await_admission(ws: &mut WsStream) -> Result<String, Error> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let admission: Admission = serde_json::from_str(text.as_str())
                    .map_err(|e| Error::TransientNetwork(format!("malformed admission frame: {e}")))?;
                if admission.status != "ok" {
                    return Err(Error::TransientNetwork(format!(
                        "admission refused with status {}",
                        admission.status
                    )));
                }
                return Ok(admission.data.session_id);
            }
            Ok(Message::Close(Some(frame))) => {
                let code = u16::from(frame.code);
                warn!(code, reason = frame.reason.as_str(), "server rejected transport");
                return Err(Error::TransportRejected { code, reason: frame.reason.as_str().to_owned() });
            }
            Ok(Message::Close(None)) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::TransientNetwork(format!("transport error: {e}"))),
        }
    }
    Err(Error::TransientNetwork("transport closed before admission".to_owned()))
}

/// WebSocket transport driven by a background reader task.
pub struct WsTransport {
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    fn spawn(ws: WsStream, identity: String) -> Self {
        let open = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(ws, identity, Arc::clone(&open), cancel.clone()));
        Self { open, cancel, task: Mutex::new(Some(task)) }
    }
}

async fn read_loop(mut ws: WsStream, identity: String, open: Arc<AtomicBool>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws.close(None).await;
                break;
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(identity = %identity, len = text.len(), "received text frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(f) => warn!(
                                identity = %identity,
                                code = u16::from(f.code),
                                reason = f.reason.as_str(),
                                "server closed transport"
                            ),
                            None => warn!(identity = %identity, "server closed transport"),
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(identity = %identity, err = %e, "transport error");
                        break;
                    }
                    None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    open.store(false, Ordering::SeqCst);
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.cancel.cancel();
            let task = self.task.lock().take();
            if let Some(task) = task {
                let _ = task.await;
            }
        })
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
