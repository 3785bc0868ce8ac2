// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use trex_core::{Error, Identity};

use crate::envelope;
use crate::error::ApiError;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub system_uuid: String,
    pub password: String,
}

/// `GET /`
pub async fn healthcheck(State(s): State<Arc<ServerState>>) -> Response {
    envelope::ok("healthy", json!({ "agents": s.registry.len() }))
}

/// `POST /auth/get_token`
pub async fn get_token(
    State(s): State<Arc<ServerState>>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(e) => return ApiError::BadRequest.to_http_response(e.body_text()),
    };
    let Some(identity) = Identity::normalize(&req.system_uuid) else {
        return ApiError::BadRequest.to_http_response("system_uuid must not be empty");
    };

    match s.broker.issue(identity.as_str(), &req.password) {
        Ok(issued) => {
            info!(identity = %identity, exp = issued.claims.exp, "issued access token");
            envelope::ok(
                "token generated",
                json!({ "access_token": issued.token, "token_type": "bearer" }),
            )
        }
        Err(Error::InvalidCredentials) => {
            warn!(identity = %identity, "rejected token request: invalid credentials");
            ApiError::InvalidCredentials.to_http_response("invalid credentials")
        }
        Err(e) => {
            warn!(identity = %identity, err = %e, "token issuance failed");
            ApiError::Internal.to_http_response("token issuance failed")
        }
    }
}
