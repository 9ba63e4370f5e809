// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `POST /v1/operations/{operation}`: one remote operation per request.
//!
//! The body is the operation request (`callerId` plus parameters). The
//! response is always the uniform envelope, with the HTTP status equal to
//! its `statusCode`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::error::GatewayError;
use crate::models::{GatewayResponse, OperationRequest};
use crate::state::AppState;

pub async fn invoke_operation(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(err) => return respond(rejection(&err)),
    };

    // Run detached so a dropped client connection cannot leave an audit
    // record pending; shutdown still cancels it.
    let service = state.service.clone();
    let cancel = state.shutdown.child_token();
    let task = tokio::spawn(async move { service.handle(&operation, request, &cancel).await });

    let response = match task.await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Invocation task failed");
            rejection(&GatewayError::Internal(format!("invocation task failed: {e}")))
        }
    };
    respond(response)
}

/// Empty bodies and `null` mean "no request"; the executor rejects them.
fn parse_request(body: &[u8]) -> Result<Option<OperationRequest>, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<OperationRequest>>(body)
        .map_err(|e| GatewayError::Format(format!("request body is not valid JSON: {e}")))
}

fn rejection(err: &GatewayError) -> GatewayResponse {
    let class = err.classify();
    GatewayResponse::error(class.status, class.code, err.to_string())
}

fn respond(response: GatewayResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}
