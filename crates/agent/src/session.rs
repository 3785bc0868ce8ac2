// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: authenticate, open the transport, provision the
//! broker, hold the session, and reconnect with backoff when it drops.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use trex_core::backoff::RetryPolicy;
use trex_core::queue::QueueProvisioner;
use trex_core::shutdown::RunningFlag;
use trex_core::{token, Error, Identity};

use crate::token_client::TokenIssuer;
use crate::transport::{Transport, TransportConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Authenticating,
    ConnectingTransport,
    Active,
    Reconnecting,
    ShuttingDown,
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Authenticating => "authenticating",
            Self::ConnectingTransport => "connecting_transport",
            Self::Active => "active",
            Self::Reconnecting => "reconnecting",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub identity: Identity,
    pub org: String,
    pub password: String,
    /// Token request attempts and the backoff used between every retry.
    pub retry: RetryPolicy,
    /// Interval between token-expiry and liveness checks while active.
    pub control_tick: Duration,
    /// Refresh the token when it expires within this window.
    pub expiry_buffer: Duration,
}

/// Agent-side session driver.
pub struct SessionClient {
    settings: SessionSettings,
    issuer: Arc<dyn TokenIssuer>,
    connector: Arc<dyn TransportConnector>,
    queues: Arc<QueueProvisioner>,
    running: RunningFlag,
    state: watch::Sender<SessionState>,
    token: Option<String>,
}

impl SessionClient {
    pub fn new(
        settings: SessionSettings,
        issuer: Arc<dyn TokenIssuer>,
        connector: Arc<dyn TransportConnector>,
        queues: Arc<QueueProvisioner>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Init);
        Self { settings, issuer, connector, queues, running: RunningFlag::new(), state, token: None }
    }

    /// The flag that stops this session. Clones share it.
    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Token currently held, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn set_state(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "session state");
        }
    }

    /// Drive the session until shutdown or a fatal error.
    ///
    /// Returns `Ok(())` when the running flag was cleared, or the fatal
    /// error otherwise. Either way the broker connection is closed and the
    /// session ends [`SessionState::Terminated`].
    pub async fn run(&mut self) -> Result<(), Error> {
        let result = self.run_cycles().await;
        match result {
            Err(Error::Cancelled) | Ok(()) => {}
            Err(ref e) => error!(identity = %self.settings.identity, err = %e, "session failed"),
        }
        self.finish().await;
        match result {
            Err(Error::Cancelled) => Ok(()),
            other => other,
        }
    }

    async fn run_cycles(&mut self) -> Result<(), Error> {
        let backoff = self.settings.retry.backoff;
        let mut attempt = 0u32;

        while self.running.is_running() {
            match self.cycle(&mut attempt).await {
                Ok(()) => {}
                Err(
                    e @ (Error::TransientNetwork(_)
                    | Error::ResourceInit(_)
                    | Error::TransportRejected { .. }),
                ) => {
                    warn!(identity = %self.settings.identity, err = %e, "session cycle failed");
                }
                Err(e) => return Err(e),
            }
            if !self.running.is_running() {
                break;
            }

            attempt = attempt.saturating_add(1);
            let wait = backoff.delay(attempt);
            self.set_state(SessionState::Reconnecting);
            info!(attempt, wait_secs = wait.as_secs(), "reconnecting");
            if !self.running.sleep(wait).await {
                break;
            }
        }
        Ok(())
    }

    /// One connect attempt. `Ok` means an active transport later dropped.
    ///
    /// The attempt counter only resets once the server has admitted the
    /// transport and the broker is provisioned.
    async fn cycle(&mut self, attempt: &mut u32) -> Result<(), Error> {
        self.set_state(SessionState::Authenticating);
        let token = self.authenticate().await?;

        self.set_state(SessionState::ConnectingTransport);
        let transport = self.open_transport(&token).await?;
        self.token = Some(token);

        if let Err(e) = self.provision_broker().await {
            transport.close().await;
            return Err(e);
        }

        self.set_state(SessionState::Active);
        info!(identity = %self.settings.identity, org = %self.settings.org, "session active");
        *attempt = 0;

        let result = self.steady_state(transport.as_ref()).await;
        transport.close().await;
        result
    }

    async fn open_transport(&self, token: &str) -> Result<Box<dyn Transport>, Error> {
        let open = self.connector.open(self.settings.identity.as_str(), token, &self.settings.org);
        tokio::select! {
            _ = self.running.stopped() => Err(Error::Cancelled),
            result = open => result,
        }
    }

    async fn provision_broker(&self) -> Result<(), Error> {
        let connect = self.queues.connect(self.settings.identity.as_str());
        tokio::select! {
            _ = self.running.stopped() => Err(Error::Cancelled),
            result = connect => result,
        }
    }

    /// Hold the session, refreshing the token in place when it nears expiry.
    /// Returns `Ok` when the transport drops or shutdown is requested.
    async fn steady_state(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        loop {
            if !self.running.sleep(self.settings.control_tick).await {
                return Ok(());
            }

            let expired = self
                .token
                .as_deref()
                .map_or(true, |t| token::is_expired(t, self.settings.expiry_buffer));
            if expired {
                info!(identity = %self.settings.identity, "access token expiring, refreshing");
                let fresh = self.authenticate().await?;
                self.token = Some(fresh);
            }

            if !transport.is_open() {
                warn!(identity = %self.settings.identity, "transport no longer open");
                return Ok(());
            }
        }
    }

    /// Request a token, retrying transient failures with backoff.
    ///
    /// A wait follows every failed attempt, including the last. Rejected
    /// credentials fail immediately; running out of attempts is
    /// [`Error::AuthExhausted`].
    pub async fn authenticate(&self) -> Result<String, Error> {
        let policy = self.settings.retry;
        let identity = self.settings.identity.as_str();
        let mut attempt = 0u32;

        while attempt < policy.max_retries {
            if !self.running.is_running() {
                return Err(Error::Cancelled);
            }

            let request = self.issuer.request_token(identity, &self.settings.password);
            let result = tokio::select! {
                _ = self.running.stopped() => return Err(Error::Cancelled),
                result = request => result,
            };

            match result {
                Ok(token) => {
                    info!(identity, "obtained access token");
                    return Ok(token);
                }
                Err(e) if !e.is_retryable() => {
                    error!(identity, err = %e, "token request rejected");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let wait = policy.backoff.delay(attempt);
                    warn!(
                        identity,
                        attempt,
                        max_retries = policy.max_retries,
                        wait_secs = wait.as_secs(),
                        err = %e,
                        "token request failed"
                    );
                    if !self.running.sleep(wait).await {
                        return Err(Error::Cancelled);
                    }
                }
            }
        }

        Err(Error::AuthExhausted { attempts: policy.max_retries })
    }

    async fn finish(&mut self) {
        self.set_state(SessionState::ShuttingDown);
        self.running.stop();
        self.queues.close().await;
        self.set_state(SessionState::Terminated);
        info!(identity = %self.settings.identity, "session terminated");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
