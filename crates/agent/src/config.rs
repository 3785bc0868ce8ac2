// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;
use trex_core::backoff::{Backoff, RetryPolicy};
use trex_core::Identity;

use crate::session::SessionSettings;

/// URL scheme that selects the in-process broker.
pub const MEMORY_SCHEME: &str = "memory://";

/// Configuration for the trex agent.
#[derive(Debug, Clone, Parser)]
#[command(name = "trex-agent", version, about = "Agent session client")]
pub struct AgentConfig {
    /// Server host or IP address.
    #[arg(long, env = "TREX_SERVER_IP")]
    pub server_ip: String,

    /// Server port.
    #[arg(long, default_value_t = 8000, env = "TREX_SERVER_PORT")]
    pub server_port: u16,

    /// Organization label sent on every transport handshake.
    #[arg(long, env = "TREX_ORG")]
    pub org: String,

    /// Shared agent secret.
    #[arg(long, env = "TREX_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Use this identity instead of the hardware UUID.
    #[arg(long, env = "TREX_IDENTITY")]
    pub identity: Option<String>,

    /// Token request attempts before giving up.
    #[arg(long, default_value_t = 5, env = "TREX_MAX_RETRIES")]
    pub max_retries: u32,

    /// Exponential backoff base.
    #[arg(long, default_value_t = 2, env = "TREX_BACKOFF_FACTOR")]
    pub backoff_factor: u32,

    /// Backoff ceiling in seconds.
    #[arg(long, default_value_t = 120, env = "TREX_MAX_BACKOFF_SECS")]
    pub max_backoff_secs: u64,

    /// Interval between token-expiry and liveness checks.
    #[arg(long, default_value_t = 5, env = "TREX_CONTROL_TICK_SECS")]
    pub control_tick_secs: u64,

    /// Refresh the token this many seconds before it expires.
    #[arg(long, default_value_t = 1, env = "TREX_EXPIRY_BUFFER_SECS")]
    pub expiry_buffer_secs: u64,

    /// Message broker URL (`nats://...` or `memory://`).
    #[arg(long, default_value = "nats://localhost:4222", env = "TREX_BROKER_URL")]
    pub broker_url: String,

    #[arg(long, default_value = "guest", env = "TREX_BROKER_USER")]
    pub broker_user: String,

    #[arg(long, default_value = "guest", env = "TREX_BROKER_PASS", hide_env_values = true)]
    pub broker_pass: String,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "TREX_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "TREX_LOG_FORMAT")]
    pub log_format: String,
}

impl AgentConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_ip.trim().is_empty() {
            anyhow::bail!("--server-ip must not be empty");
        }
        if self.org.trim().is_empty() {
            anyhow::bail!("--org must not be empty");
        }
        if self.password.is_empty() {
            anyhow::bail!("--password must not be empty");
        }
        if let Some(ref id) = self.identity {
            if Identity::normalize(id).is_none() {
                anyhow::bail!("--identity must not be blank");
            }
        }
        if self.max_retries == 0 {
            anyhow::bail!("--max-retries must be at least 1");
        }
        if self.backoff_factor < 2 {
            anyhow::bail!("--backoff-factor must be at least 2");
        }
        if self.control_tick_secs == 0 {
            anyhow::bail!("--control-tick-secs must be positive");
        }
        if !self.broker_url.starts_with("nats://") && !self.uses_memory_broker() {
            anyhow::bail!("unsupported broker url: {}", self.broker_url);
        }
        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }

    /// Base URL of the token endpoint's server.
    pub fn http_base(&self) -> String {
        format!("http://{}:{}", self.server_ip, self.server_port)
    }

    /// Base URL for transport handshakes.
    pub fn ws_base(&self) -> String {
        format!("ws://{}:{}", self.server_ip, self.server_port)
    }

    pub fn uses_memory_broker(&self) -> bool {
        self.broker_url.starts_with(MEMORY_SCHEME)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Backoff::new(self.backoff_factor, self.max_backoff_secs),
        }
    }

    pub fn session_settings(&self, identity: Identity) -> SessionSettings {
        SessionSettings {
            identity,
            org: self.org.trim().to_owned(),
            password: self.password.clone(),
            retry: self.retry_policy(),
            control_tick: Duration::from_secs(self.control_tick_secs),
            expiry_buffer: Duration::from_secs(self.expiry_buffer_secs),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
