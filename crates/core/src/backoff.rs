// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capped exponential backoff shared by every retry loop.

use std::time::Duration;

/// `delay(n) = min(factor^n, max)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub factor: u32,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { factor: 2, max: Duration::from_secs(120) }
    }
}

impl Backoff {
    pub fn new(factor: u32, max_secs: u64) -> Self {
        Self { factor, max: Duration::from_secs(max_secs) }
    }

    /// Wait before retry number `attempt` (1-based after the first failure).
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.max.as_secs();
        let secs = u64::from(self.factor).checked_pow(attempt).map_or(cap, |s| s.min(cap));
        Duration::from_secs(secs)
    }
}

/// Retry tunables for a bounded retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5, backoff: Backoff::default() }
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
