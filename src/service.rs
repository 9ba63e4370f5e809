// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Service
//!
//! Wires the executor to the claims operations and exposes the small admin
//! surface for descriptors. Every descriptor change invalidates the
//! caller's cached cipher secret.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::{AuthorizationGate, TokenProvider};
use crate::config::GatewayConfig;
use crate::crypto::{CipherKeyResolver, ZeroPaddedAesCbc};
use crate::error::GatewayResult;
use crate::executor::OperationExecutor;
use crate::models::{GatewayResponse, OperationKind, OperationRequest};
use crate::operations::ClaimsOperations;
use crate::providers::{build_http_client, ClaimsApiClient};
use crate::storage::{AuditLogger, DescriptorStore, GatewayDatabase, OperationDescriptor};

pub struct GatewayService {
    executor: OperationExecutor,
    operations: ClaimsOperations,
    descriptors: Arc<dyn DescriptorStore>,
    keys: Arc<CipherKeyResolver>,
}

impl GatewayService {
    /// Build the full service over an opened database.
    pub fn new(config: &GatewayConfig, database: Arc<GatewayDatabase>) -> GatewayResult<Self> {
        let http = build_http_client(&config.transport)?;
        let keys = Arc::new(CipherKeyResolver::new(database.clone(), &config.key_cache));

        let operations = ClaimsOperations::new(
            TokenProvider::new(config.transport.auth_url.clone(), http.clone()),
            keys.clone(),
            Arc::new(ZeroPaddedAesCbc::new()),
            ClaimsApiClient::new(&config.transport, http),
            config.transport.software_certificate_id.clone(),
        );
        let executor = OperationExecutor::new(
            AuthorizationGate::new(database.clone()),
            AuditLogger::new(database.clone(), config.audit.clone()),
        );

        info!(
            api_base_url = %config.transport.api_base_url,
            audit_enabled = config.audit.enabled,
            "Gateway service ready"
        );
        Ok(Self {
            executor,
            operations,
            descriptors: database,
            keys,
        })
    }

    /// Execute one operation invocation end to end.
    pub async fn handle(
        &self,
        operation: &str,
        request: Option<OperationRequest>,
        cancel: &CancellationToken,
    ) -> GatewayResponse {
        self.executor
            .execute(operation, request, cancel, |call| self.operations.run(call))
            .await
    }

    /// Register or replace a descriptor.
    pub fn register_descriptor(&self, descriptor: &OperationDescriptor) -> GatewayResult<()> {
        descriptor.validate()?;
        self.descriptors.upsert_descriptor(descriptor)?;
        self.keys.invalidate(&descriptor.caller_id);
        info!(
            caller_id = %descriptor.caller_id,
            operation = %descriptor.operation_name,
            active = descriptor.is_active,
            "Descriptor registered"
        );
        Ok(())
    }

    pub fn rotate_secret(
        &self,
        caller_id: &str,
        operation: OperationKind,
        secret_key: &str,
    ) -> GatewayResult<OperationDescriptor> {
        let descriptor = self
            .descriptors
            .rotate_secret(caller_id, operation, secret_key)?;
        self.keys.invalidate(caller_id);
        info!(caller_id = %caller_id, operation = %operation, "Cipher secret rotated");
        Ok(descriptor)
    }

    pub fn rotate_caller_code(
        &self,
        caller_id: &str,
        operation: OperationKind,
        caller_code: &str,
    ) -> GatewayResult<OperationDescriptor> {
        let descriptor = self
            .descriptors
            .rotate_caller_code(caller_id, operation, caller_code)?;
        self.keys.invalidate(caller_id);
        info!(caller_id = %caller_id, operation = %operation, "Caller code rotated");
        Ok(descriptor)
    }

    /// Current cipher secret of a caller, as the operations see it.
    pub fn cipher_key(&self, caller_id: &str) -> String {
        self.keys.get_key(caller_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditPolicy, KeyCacheConfig, TransportConfig};
    use crate::crypto::EnvelopeCipher;
    use crate::error::GatewayError;
    use crate::storage::{AuditStatus, AuditStore};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CALLER: &str = "H92006568";

    fn config(base_url: String, data_dir: PathBuf) -> GatewayConfig {
        let mut transport = TransportConfig::for_base_url(base_url);
        transport.max_retries = 0;
        transport.software_certificate_id = "CERT-1".to_string();
        GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir,
            transport,
            key_cache: KeyCacheConfig {
                default_secret: "fallback".to_string(),
                ..KeyCacheConfig::default()
            },
            audit: AuditPolicy::all(),
            seed_descriptors_file: None,
            log_json: false,
        }
    }

    async fn setup() -> (TempDir, MockServer, Arc<GatewayDatabase>, GatewayService) {
        let temp = TempDir::new().unwrap();
        let server = MockServer::start().await;
        let config = config(server.uri(), temp.path().to_path_buf());
        let db = Arc::new(GatewayDatabase::open(&config.database_path()).unwrap());
        let service = GatewayService::new(&config, db.clone()).unwrap();
        (temp, server, db, service)
    }

    #[tokio::test]
    async fn end_to_end_member_lookup() {
        let (_temp, server, db, service) = setup().await;
        service
            .register_descriptor(&OperationDescriptor::new(
                CALLER,
                OperationKind::MemberLookup,
                "s3cret",
                "C1",
            ))
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/auth/token"))
            .and(header("softwareCertificateId", "CERT-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": "tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/member-pin"))
            .and(header("token", "tok"))
            .and(header("callerCode", "C1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "result": {"pin": "190000000001"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = OperationRequest::new(CALLER)
            .with_field("lastname", "Dela Cruz")
            .with_field("firstname", "Juan")
            .with_field("birthdate", "01-01-2000");
        let response = service
            .handle("member-pin", Some(request), &CancellationToken::new())
            .await;

        assert!(response.success, "{}", response.message);
        assert_eq!(response.data, json!({"pin": "190000000001"}));

        let records = db.list_audit_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AuditStatus::Success);
        assert_eq!(
            records[0].response_payload.as_deref(),
            Some(r#"{"pin":"************"}"#)
        );
    }

    #[tokio::test]
    async fn unknown_caller_never_reaches_remote() {
        let (_temp, server, db, service) = setup().await;

        let response = service
            .handle(
                "claim-status",
                Some(OperationRequest::new("H00000000")),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(response.status_code, 503);
        assert_eq!(response.error_code, "AUTH_ERROR");
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(db.list_audit_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rotation_invalidates_cached_secret() {
        let (_temp, _server, _db, service) = setup().await;
        service
            .register_descriptor(&OperationDescriptor::new(
                CALLER,
                OperationKind::EncryptDocument,
                "old",
                "C1",
            ))
            .unwrap();
        assert_eq!(service.cipher_key(CALLER), "old");

        let rotated = service
            .rotate_secret(CALLER, OperationKind::EncryptDocument, "new")
            .unwrap();
        assert_eq!(rotated.secret_key, "new");
        assert_eq!(service.cipher_key(CALLER), "new");

        let recoded = service
            .rotate_caller_code(CALLER, OperationKind::EncryptDocument, "C2")
            .unwrap();
        assert_eq!(recoded.caller_code, "C2");
    }

    #[tokio::test]
    async fn local_encrypt_is_readable_with_rotated_secret() {
        let (_temp, _server, _db, service) = setup().await;
        service
            .register_descriptor(&OperationDescriptor::new(
                CALLER,
                OperationKind::EncryptDocument,
                "k1",
                "C1",
            ))
            .unwrap();

        let response = service
            .handle(
                "encrypt-document",
                Some(OperationRequest::new(CALLER).with_field("document", "<eCLAIMS/>")),
                &CancellationToken::new(),
            )
            .await;
        assert!(response.success);

        let opened = ZeroPaddedAesCbc::new()
            .open(&response.data.to_string(), "k1")
            .unwrap();
        assert_eq!(opened.trim_end_matches('\0'), "<eCLAIMS/>");
    }

    #[tokio::test]
    async fn rotating_a_missing_descriptor_is_database_error() {
        let (_temp, _server, _db, service) = setup().await;
        let err = service
            .rotate_secret(CALLER, OperationKind::ClaimStatus, "x")
            .unwrap_err();
        assert!(matches!(err, GatewayError::Persistence(_)));
    }

    #[tokio::test]
    async fn invalid_caller_id_is_refused_on_registration() {
        let (_temp, _server, _db, service) = setup().await;
        let err = service
            .register_descriptor(&OperationDescriptor::new(
                "H1|x",
                OperationKind::ClaimStatus,
                "s",
                "C",
            ))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Persistence(_)));
    }
}
