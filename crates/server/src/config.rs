// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;
use jsonwebtoken::Algorithm;
use trex_core::token::BrokerSettings;

/// URL scheme that selects the in-process broker or status store.
pub const MEMORY_SCHEME: &str = "memory://";

/// Configuration for the trex server.
#[derive(Debug, Clone, Parser)]
#[command(name = "trex-server", version, about = "Agent session server")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "TREX_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000, env = "TREX_PORT")]
    pub port: u16,

    /// Shared secret every agent presents when requesting a token.
    #[arg(long, env = "TREX_AGENT_SECRET", hide_env_values = true)]
    pub agent_secret: String,

    /// HMAC key used to sign access tokens.
    #[arg(long, env = "TREX_SIGNING_KEY", hide_env_values = true)]
    pub signing_key: String,

    /// Token signing algorithm (HS256, HS384, HS512).
    #[arg(long, default_value = "HS256", env = "TREX_ALGORITHM")]
    pub algorithm: String,

    /// Access token lifetime in minutes.
    #[arg(long, default_value_t = 60, env = "TREX_TOKEN_TTL_MINUTES")]
    pub token_ttl_minutes: u64,

    /// Message broker URL (`nats://...` or `memory://`).
    #[arg(long, default_value = "nats://localhost:4222", env = "TREX_BROKER_URL")]
    pub broker_url: String,

    #[arg(long, default_value = "guest", env = "TREX_BROKER_USER")]
    pub broker_user: String,

    #[arg(long, default_value = "guest", env = "TREX_BROKER_PASS", hide_env_values = true)]
    pub broker_pass: String,

    /// Status store URL (`mongodb://...` or `memory://`).
    #[arg(long, default_value = "mongodb://localhost:27017", env = "TREX_MONGO_URL")]
    pub mongo_url: String,

    /// Status store database name.
    #[arg(long, default_value = "trex_db", env = "TREX_MONGO_DB")]
    pub mongo_db: String,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "TREX_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "TREX_LOG_FORMAT")]
    pub log_format: String,
}

impl ServerConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent_secret.is_empty() {
            anyhow::bail!("--agent-secret must not be empty");
        }
        if self.signing_key.is_empty() {
            anyhow::bail!("--signing-key must not be empty");
        }
        self.algorithm()?;
        if self.token_ttl_minutes == 0 {
            anyhow::bail!("--token-ttl-minutes must be positive");
        }
        if !self.broker_url.starts_with("nats://") && !self.uses_memory_broker() {
            anyhow::bail!("unsupported broker url: {}", self.broker_url);
        }
        if !self.mongo_url.starts_with("mongodb") && !self.uses_memory_store() {
            anyhow::bail!("unsupported status store url: {}", self.mongo_url);
        }
        if self.mongo_db.is_empty() {
            anyhow::bail!("--mongo-db must not be empty");
        }
        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn algorithm(&self) -> anyhow::Result<Algorithm> {
        let alg: Algorithm = self
            .algorithm
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid algorithm: {}", self.algorithm))?;
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(alg),
            other => anyhow::bail!("unsupported algorithm: {other:?} (expected HS256, HS384 or HS512)"),
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes * 60)
    }

    pub fn broker_settings(&self) -> anyhow::Result<BrokerSettings> {
        Ok(BrokerSettings {
            agent_secret: self.agent_secret.clone(),
            signing_key: self.signing_key.clone(),
            algorithm: self.algorithm()?,
            ttl: self.token_ttl(),
        })
    }

    pub fn uses_memory_broker(&self) -> bool {
        self.broker_url.starts_with(MEMORY_SCHEME)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.mongo_url.starts_with(MEMORY_SCHEME)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
