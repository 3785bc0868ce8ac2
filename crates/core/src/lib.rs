// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared building blocks for the trex server and agent: identities, signed
//! access tokens, retry backoff, cooperative shutdown, and message-queue
//! provisioning.

pub mod backoff;
pub mod error;
pub mod identity;
pub mod logging;
pub mod queue;
pub mod shutdown;
pub mod token;

pub use error::{Error, Result};
pub use identity::Identity;

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
