// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end session tests.
//!
//! Runs the real server router on a loopback listener with the in-process
//! broker and status store, and drives real session clients against it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trex_agent::session::{SessionClient, SessionSettings};
use trex_agent::token_client::HttpTokenIssuer;
use trex_agent::transport::WsConnector;
use trex_core::backoff::RetryPolicy;
use trex_core::queue::memory::MemoryBroker;
use trex_core::queue::QueueProvisioner;
use trex_core::token::{BrokerSettings, CredentialBroker, DEFAULT_TTL};
use trex_core::Identity;
use trex_server::state::ServerState;
use trex_server::store::{MemoryStatusStore, StatusStore};

/// Shared agent secret the harness server accepts.
pub const SECRET: &str = "treacle_authpass";

/// A running in-process server, stopped on [`ServerHarness::stop`].
pub struct ServerHarness {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    pub store: Arc<MemoryStatusStore>,
    pub broker: MemoryBroker,
    task: JoinHandle<anyhow::Result<()>>,
}

impl ServerHarness {
    pub async fn start() -> anyhow::Result<Self> {
        let tokens = CredentialBroker::new(BrokerSettings {
            agent_secret: SECRET.to_owned(),
            signing_key: "specs-signing-key".to_owned(),
            algorithm: Algorithm::HS256,
            ttl: DEFAULT_TTL,
        })?;
        let store = Arc::new(MemoryStatusStore::new());
        let broker = MemoryBroker::new();
        let queues = Arc::new(QueueProvisioner::new(Arc::new(broker.clone())));
        queues.connect_channels().await?;

        let state = Arc::new(ServerState::new(
            tokens,
            queues,
            Arc::clone(&store) as Arc<dyn StatusStore>,
            CancellationToken::new(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(trex_server::serve(Arc::clone(&state), listener));
        Ok(Self { addr, state, store, broker, task })
    }

    pub fn http_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_base(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Session client for `identity` pointed at this server, with its own
    /// in-process broker.
    pub fn client(&self, identity: &str, password: &str) -> anyhow::Result<(SessionClient, MemoryBroker)> {
        self.client_with_org(identity, password, "orgX")
    }

    pub fn client_with_org(
        &self,
        identity: &str,
        password: &str,
        org: &str,
    ) -> anyhow::Result<(SessionClient, MemoryBroker)> {
        let identity =
            Identity::normalize(identity).ok_or_else(|| anyhow::anyhow!("blank identity"))?;
        let settings = SessionSettings {
            identity,
            org: org.to_owned(),
            password: password.to_owned(),
            retry: RetryPolicy::default(),
            control_tick: Duration::from_secs(1),
            expiry_buffer: Duration::from_secs(1),
        };
        let broker = MemoryBroker::new();
        let client = SessionClient::new(
            settings,
            Arc::new(HttpTokenIssuer::new(&self.http_base())?),
            Arc::new(WsConnector::new(self.ws_base())),
            Arc::new(QueueProvisioner::new(Arc::new(broker.clone()))),
        );
        Ok((client, broker))
    }

    /// Trigger graceful shutdown and wait for the server to stop.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.state.shutdown.cancel();
        self.task.await?
    }
}

/// Poll `check` every 20ms until it passes or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
