// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative shutdown: a process-wide running flag and waits that observe it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Granularity at which long waits re-check the running flag.
pub const WAIT_STEP: Duration = Duration::from_secs(1);

/// Process-wide cooperative cancellation flag.
///
/// Monotonic: once [`stop`](Self::stop) is called the flag never reads as
/// running again. Clones share the same underlying signal.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag {
    token: CancellationToken,
}

impl RunningFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Resolves once the flag has been cleared.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Sleep for `duration` in steps of at most [`WAIT_STEP`], each raced
    /// against the flag.
    ///
    /// Returns `true` if the full duration elapsed, `false` if shutdown cut
    /// the wait short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if !self.is_running() {
                return false;
            }
            let step = remaining.min(WAIT_STEP);
            tokio::select! {
                _ = self.token.cancelled() => return false,
                _ = tokio::time::sleep(step) => {}
            }
            remaining = remaining.saturating_sub(step);
        }
        self.is_running()
    }

    /// Spawn a task that clears the flag on SIGINT or SIGTERM.
    pub fn stop_on_signals(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGTERM, shutting down gracefully");
                }
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGINT, shutting down gracefully");
                }
                _ = flag.stopped() => return,
            }
            flag.stop();
        });
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
