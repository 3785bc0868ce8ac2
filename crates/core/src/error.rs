// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Failure kinds shared by the server and agent.
///
/// Retry boundaries branch on [`Error::is_retryable`]: transient failures are
/// swallowed and retried with backoff, everything else propagates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure talking to the server (token request, transport open).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The shared secret was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token failed verification. Expired, forged, and malformed tokens are
    /// deliberately indistinguishable.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The server closed the transport during the handshake instead of
    /// admitting it.
    #[error("transport rejected with close code {code}: {reason}")]
    TransportRejected { code: u16, reason: String },

    /// Broker or status store could not be acquired.
    #[error("resource initialization failed: {0}")]
    ResourceInit(String),

    /// Disconnect requested for an identity with no live session.
    #[error("no active connection for {0}")]
    UnknownIdentity(String),

    /// Authentication gave up after the configured number of attempts.
    #[error("authentication failed after {attempts} attempts")]
    AuthExhausted { attempts: u32 },

    /// Shutdown was observed mid-operation.
    #[error("cancelled by shutdown")]
    Cancelled,
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork(_) => "TRANSIENT_NETWORK",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TransportRejected { .. } => "TRANSPORT_REJECTED",
            Self::ResourceInit(_) => "RESOURCE_INIT",
            Self::UnknownIdentity(_) => "UNKNOWN_IDENTITY",
            Self::AuthExhausted { .. } => "AUTH_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
