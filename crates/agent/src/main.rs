// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use trex_agent::config::AgentConfig;

#[tokio::main]
async fn main() {
    let config = AgentConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    trex_core::logging::init_tracing(&config.log_level, &config.log_format);

    if let Err(e) = trex_agent::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
