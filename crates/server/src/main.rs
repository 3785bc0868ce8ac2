// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use trex_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    trex_core::logging::init_tracing(&config.log_level, &config.log_format);

    if let Err(e) = trex_server::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
