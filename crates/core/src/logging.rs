// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `level` is an `EnvFilter` directive (falls back to `info` when it does not
/// parse); `format` is `json` or anything else for human-readable text.
/// A second call is a no-op.
pub fn init_tracing(level: &str, format: &str) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}
