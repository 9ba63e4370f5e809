// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP transport to the remote claims API.
//!
//! One [`ClaimsApiClient::call`] is one logical remote attempt as far as the
//! executor and the audit log are concerned. Transient transport failures
//! (connection errors, 502/503/504) are retried here, below that line, with
//! bounded exponential backoff.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::auth::token::ACCREDITATION_HEADER;
use crate::config::TransportConfig;
use crate::crypto::{Envelope, InboundReply};
use crate::error::{GatewayError, GatewayResult};
use crate::models::OperationKind;

pub const TOKEN_HEADER: &str = "token";
pub const CALLER_CODE_HEADER: &str = "callerCode";

/// Upper bound of a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Headers identifying the caller on a remote call.
#[derive(Debug, Clone, Copy)]
pub struct CallCredentials<'a> {
    pub token: &'a str,
    pub caller_id: &'a str,
    pub caller_code: &'a str,
}

#[derive(Debug, Clone)]
pub struct ClaimsApiClient {
    base_url: String,
    http: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

/// Build the shared, pooled HTTP client with the configured timeout.
pub fn build_http_client(config: &TransportConfig) -> GatewayResult<Client> {
    Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))
}

impl ClaimsApiClient {
    pub fn new(config: &TransportConfig, http: Client) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
        }
    }

    pub fn endpoint(&self, operation: OperationKind) -> String {
        format!("{}/{}", self.base_url, operation.wire_name())
    }

    /// POST a sealed envelope to the operation's endpoint and decode the
    /// reply.
    pub async fn call(
        &self,
        operation: OperationKind,
        credentials: CallCredentials<'_>,
        envelope: &Envelope,
    ) -> GatewayResult<InboundReply> {
        let url = self.endpoint(operation);
        let mut attempt = 0u32;

        loop {
            let sent = self
                .http
                .post(&url)
                .header(TOKEN_HEADER, credentials.token)
                .header(ACCREDITATION_HEADER, credentials.caller_id)
                .header(CALLER_CODE_HEADER, credentials.caller_code)
                .json(envelope)
                .send()
                .await;

            let retryable = match &sent {
                Ok(response) => is_transient_status(response.status()),
                Err(e) => e.is_connect(),
            };
            if retryable && attempt < self.max_retries {
                let delay = backoff_delay(self.retry_base_delay, attempt);
                attempt += 1;
                warn!(
                    operation = %operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient claims API failure, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let response = sent
                .map_err(|e| GatewayError::transport(format!("POST {operation} failed"), e))?;
            let status = response.status();
            let body = response.text().await.map_err(|e| {
                GatewayError::transport(format!("POST {operation} response unreadable"), e)
            })?;

            if !status.is_success() {
                return Err(GatewayError::ExternalApi(format!(
                    "POST {operation} returned {status}: {body}"
                )));
            }

            debug!(operation = %operation, attempts = attempt + 1, "Claims API call completed");
            return InboundReply::parse(&body);
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// `base * 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16)).min(MAX_BACKOFF)
}
