// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token fetching from the remote auth endpoint.
//!
//! A fresh token is requested for every invocation. Whether the remote side
//! would accept a reused token is unknown, so nothing is cached here.

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::crypto::InboundReply;
use crate::error::{GatewayError, GatewayResult};

pub const ACCREDITATION_HEADER: &str = "accreditationNo";
pub const CERTIFICATE_HEADER: &str = "softwareCertificateId";

/// Fetches short-lived tokens for remote calls.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    auth_url: String,
    http: Client,
}

impl TokenProvider {
    /// `http` is the shared, pooled client.
    pub fn new(auth_url: impl Into<String>, http: Client) -> Self {
        Self {
            auth_url: auth_url.into(),
            http,
        }
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Request a token for the caller.
    pub async fn get_token(&self, caller_id: &str, certificate_id: &str) -> GatewayResult<String> {
        let response = self
            .http
            .get(&self.auth_url)
            .header(ACCREDITATION_HEADER, caller_id)
            .header(CERTIFICATE_HEADER, certificate_id)
            .send()
            .await
            .map_err(|e| GatewayError::transport("token request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::transport("token response could not be read", e))?;

        if !status.is_success() {
            return Err(GatewayError::ExternalApi(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token = extract_token(&body)?;
        debug!(caller_id = %caller_id, "Fetched remote API token");
        Ok(token)
    }
}

/// Pull the token out of a token endpoint body.
///
/// Accepts `{success, message, result: "<token>"}` as well as a plain
/// `{token: "<token>"}`.
fn extract_token(body: &str) -> GatewayResult<String> {
    let payload = match InboundReply::parse(body)? {
        InboundReply::Failure(message) => return Err(GatewayError::ExternalApi(message)),
        InboundReply::Success(payload) => payload,
    };

    let token = match &payload {
        Value::String(token) => Some(token.as_str()),
        other => other.get("token").and_then(Value::as_str),
    };

    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Format("token response carries no token".to_string()))
}
