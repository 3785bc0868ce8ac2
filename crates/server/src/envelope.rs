// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{status, message, data}` response wrapping shared by every handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    /// First frame on an admitted agent transport. Agents wait for it before
    /// treating the session as active.
    pub fn admitted(session_id: &str) -> Self {
        Self {
            status: "ok".to_owned(),
            message: "connected".to_owned(),
            data: serde_json::json!({ "session_id": session_id }),
        }
    }
}

/// 200 response with `status: "ok"`.
pub fn ok(message: impl Into<String>, data: Value) -> Response {
    let body = Envelope { status: "ok".to_owned(), message: message.into(), data };
    (StatusCode::OK, Json(body)).into_response()
}

/// Error response with `status: "error"`, empty data, and the code's HTTP status.
pub fn error(code: ApiError, message: impl Into<String>) -> Response {
    let body = Envelope {
        status: "error".to_owned(),
        message: message.into(),
        data: Value::Object(Default::default()),
    };
    (code.status_code(), Json(body)).into_response()
}
