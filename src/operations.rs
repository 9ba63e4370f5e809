// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Claims Operations
//!
//! The domain function handed to the executor. For a remote operation:
//!
//! 1. fetch a fresh token for the caller
//! 2. resolve the caller's cipher secret
//! 3. seal the payload (request parameters as JSON, or the XML document)
//! 4. POST the envelope to the operation's endpoint
//! 5. decode the reply, opening it when it is itself an envelope
//!
//! `encrypt-document` and `decrypt-document` stop after step 2 and run the
//! cipher locally.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::auth::TokenProvider;
use crate::crypto::{CipherKeyResolver, Envelope, EnvelopeCipher, InboundReply, SealedParts};
use crate::error::{GatewayError, GatewayResult};
use crate::executor::OperationCall;
use crate::models::{OperationKind, OperationRequest, RequestMode};
use crate::providers::{CallCredentials, ClaimsApiClient};

pub const JSON_MIME: &str = "application/json";
pub const XML_MIME: &str = "text/xml";

/// Executes authorized operation calls.
pub struct ClaimsOperations {
    tokens: TokenProvider,
    keys: Arc<CipherKeyResolver>,
    cipher: Arc<dyn EnvelopeCipher>,
    api: ClaimsApiClient,
    default_certificate_id: String,
}

impl ClaimsOperations {
    pub fn new(
        tokens: TokenProvider,
        keys: Arc<CipherKeyResolver>,
        cipher: Arc<dyn EnvelopeCipher>,
        api: ClaimsApiClient,
        default_certificate_id: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            keys,
            cipher,
            api,
            default_certificate_id: default_certificate_id.into(),
        }
    }

    /// Run one call; `Ok(None)` when the remote result is empty.
    pub async fn run(&self, call: OperationCall) -> GatewayResult<Option<Value>> {
        let OperationCall {
            kind,
            request,
            descriptor,
        } = call;

        match kind.mode() {
            RequestMode::Local => self.run_local(kind, &request),
            mode => {
                let certificate_id = request
                    .certificate_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .unwrap_or(&self.default_certificate_id);
                let token = self.tokens.get_token(&request.caller_id, certificate_id).await?;

                let secret = self.keys.get_key(&request.caller_id);
                let envelope = self.seal_request(mode, &request, &secret)?;

                let reply = self
                    .api
                    .call(
                        kind,
                        CallCredentials {
                            token: &token,
                            caller_id: &request.caller_id,
                            caller_code: &descriptor.caller_code,
                        },
                        &envelope,
                    )
                    .await?;
                self.decode_reply(kind, reply, &secret)
            }
        }
    }

    fn run_local(
        &self,
        kind: OperationKind,
        request: &OperationRequest,
    ) -> GatewayResult<Option<Value>> {
        let document = request
            .document()
            .ok_or_else(|| GatewayError::Validation("document is required".to_string()))?;
        let secret = self.keys.get_key(&request.caller_id);

        match kind {
            OperationKind::EncryptDocument => {
                let envelope = self.cipher.seal(document, &secret, XML_MIME)?;
                let value = serde_json::to_value(envelope).map_err(|e| {
                    GatewayError::Internal(format!("failed to serialize envelope: {e}"))
                })?;
                Ok(Some(value))
            }
            OperationKind::DecryptDocument => {
                let plaintext = self.cipher.open(document, &secret)?;
                Ok(Some(Value::String(plaintext)))
            }
            other => Err(GatewayError::Internal(format!(
                "{other} is not a local operation"
            ))),
        }
    }

    fn seal_request(
        &self,
        mode: RequestMode,
        request: &OperationRequest,
        secret: &str,
    ) -> GatewayResult<Envelope> {
        match mode {
            RequestMode::Document => {
                let document = request
                    .document()
                    .ok_or_else(|| GatewayError::Validation("document is required".to_string()))?;
                self.cipher.seal(document, secret, XML_MIME)
            }
            _ => {
                let payload = serde_json::to_string(&request.fields).map_err(|e| {
                    GatewayError::Internal(format!("failed to serialize parameters: {e}"))
                })?;
                self.cipher.seal(&payload, secret, JSON_MIME)
            }
        }
    }

    fn decode_reply(
        &self,
        kind: OperationKind,
        reply: InboundReply,
        secret: &str,
    ) -> GatewayResult<Option<Value>> {
        match reply {
            InboundReply::Failure(message) => Err(GatewayError::ExternalApi(message)),
            InboundReply::Success(Value::Null) => {
                debug!(operation = %kind, "Remote returned no result");
                Ok(None)
            }
            InboundReply::Success(result) if SealedParts::from_value(&result).is_some() => {
                let plaintext = self.cipher.open(&result.to_string(), secret)?;
                Ok(Some(Value::String(plaintext)))
            }
            InboundReply::Success(result) => Ok(Some(result)),
        }
    }
}
