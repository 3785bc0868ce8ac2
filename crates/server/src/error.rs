// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::response::Response;

use crate::envelope;

/// Error codes for the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    BadRequest,
    InvalidCredentials,
    Internal,
}

impl ApiError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::InvalidCredentials => 400,
            Self::Internal => 500,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> Response {
        envelope::error(*self, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application close codes sent when a WebSocket handshake is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Token missing, invalid, expired, or issued to another identity.
    InvalidToken,
    /// Organization query parameter missing or empty.
    MissingOrg,
}

impl CloseCode {
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidToken => 4001,
            Self::MissingOrg => 4002,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid or expired token",
            Self::MissingOrg => "missing org",
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.reason())
    }
}
