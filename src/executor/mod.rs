// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Operation Executor
//!
//! Runs every remote operation through the same pipeline:
//!
//! ```text
//! Validating → Authorizing → LoggingPending → Executing → LoggingTerminal → Completed
//!      └────────────┴──────────────┴──────────────┴──────────────┴──────────→ Failed
//! ```
//!
//! ## Guarantees
//!
//! - No error escapes [`OperationExecutor::execute`]; every outcome is a
//!   [`GatewayResponse`].
//! - An opened audit record is closed exactly once, as `Success` only when
//!   the returned envelope is successful.
//! - Failure messages carry the innermost error text, the elapsed time and,
//!   when a record exists, the audit record id.
//! - The domain function runs at most once per invocation. Retrying is the
//!   transport's job.

pub mod validation;

use std::future::Future;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthorizationGate;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{GatewayResponse, OperationKind, OperationRequest, NO_DATA_MESSAGE};
use crate::storage::{AuditHandle, AuditLogger, AuditStatus, OperationDescriptor};

pub const SUCCESS_MESSAGE: &str = "Operation completed successfully";

/// Pipeline stage, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Authorizing,
    LoggingPending,
    Executing,
    LoggingTerminal,
    Completed,
    Failed,
}

/// Everything the domain function gets for one authorized invocation.
#[derive(Debug, Clone)]
pub struct OperationCall {
    pub kind: OperationKind,
    pub request: OperationRequest,
    pub descriptor: OperationDescriptor,
}

/// Mutable bookkeeping of one invocation.
struct Invocation {
    started: Instant,
    phase: Phase,
    audit: Option<AuditHandle>,
    audit_id: Option<String>,
}

impl Invocation {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            phase: Phase::Validating,
            audit: None,
            audit_id: None,
        }
    }

    /// Move to `phase`. Timing restarts when the audit record opens.
    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "Executor phase");
        if phase == Phase::LoggingPending {
            self.started = Instant::now();
        }
        self.phase = phase;
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// Validates, authorizes, audits and classifies remote operations.
#[derive(Clone)]
pub struct OperationExecutor {
    gate: AuthorizationGate,
    audit: AuditLogger,
}

impl OperationExecutor {
    pub fn new(gate: AuthorizationGate, audit: AuditLogger) -> Self {
        Self { gate, audit }
    }

    /// Run one invocation of `operation` through the pipeline.
    ///
    /// `domain` performs the actual work and is called at most once.
    /// `Ok(None)` from it means the remote side found nothing. Cancelling
    /// `cancel` aborts the domain future and fails the invocation.
    pub async fn execute<F, Fut>(
        &self,
        operation: &str,
        request: Option<OperationRequest>,
        cancel: &CancellationToken,
        domain: F,
    ) -> GatewayResponse
    where
        F: FnOnce(OperationCall) -> Fut,
        Fut: Future<Output = GatewayResult<Option<Value>>>,
    {
        let mut invocation = Invocation::new();

        match self
            .run(&mut invocation, operation, request, cancel, domain)
            .await
        {
            Ok(response) => {
                invocation.enter(Phase::Completed);
                info!(
                    operation = %operation,
                    elapsed_ms = invocation.elapsed_ms() as u64,
                    audit_id = invocation.audit_id.as_deref().unwrap_or(""),
                    "Operation completed"
                );
                response
            }
            Err(err) => self.fail(&mut invocation, operation, err),
        }
    }

    async fn run<F, Fut>(
        &self,
        invocation: &mut Invocation,
        operation: &str,
        request: Option<OperationRequest>,
        cancel: &CancellationToken,
        domain: F,
    ) -> GatewayResult<GatewayResponse>
    where
        F: FnOnce(OperationCall) -> Fut,
        Fut: Future<Output = GatewayResult<Option<Value>>>,
    {
        let kind = validation::resolve_operation(operation)?;
        let request = validation::validate_common(request)?;

        invocation.enter(Phase::Authorizing);
        let descriptor = self.gate.authorize(&request.caller_id, kind)?;
        validation::validate_fields(kind, &request)?;

        invocation.enter(Phase::LoggingPending);
        let request_payload = serde_json::to_string(&request)
            .map_err(|e| GatewayError::Internal(format!("request not serializable: {e}")))?;
        if let Some(handle) = self.audit.open(
            &request.caller_id,
            kind,
            &request_payload,
            request.chargeable_items(),
        )? {
            invocation.audit_id = Some(handle.id().to_string());
            invocation.audit = Some(handle);
        }

        invocation.enter(Phase::Executing);
        let call = OperationCall {
            kind,
            request,
            descriptor,
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            result = domain(call) => result?,
        };

        let (response, audit_text) = match result {
            Some(data) => {
                let text = match &data {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (GatewayResponse::ok(data, SUCCESS_MESSAGE), text)
            }
            None => (GatewayResponse::no_data(), NO_DATA_MESSAGE.to_string()),
        };

        invocation.enter(Phase::LoggingTerminal);
        if let Some(handle) = &invocation.audit {
            self.audit.close(handle, &audit_text, AuditStatus::Success)?;
            invocation.audit = None;
        }

        Ok(response)
    }

    fn fail(
        &self,
        invocation: &mut Invocation,
        operation: &str,
        err: GatewayError,
    ) -> GatewayResponse {
        let failed_in = invocation.phase;
        invocation.enter(Phase::Failed);

        let detail = format!(
            "{} (elapsed {} ms)",
            err.innermost_message(),
            invocation.elapsed_ms()
        );
        if let Some(handle) = invocation.audit.take() {
            self.audit.close_failed(&handle, &detail);
        }

        let class = err.classify();
        let message = match &invocation.audit_id {
            Some(id) => format!("{detail} [audit: {id}]"),
            None => detail,
        };

        warn!(
            operation = %operation,
            phase = ?failed_in,
            error_code = class.code,
            status = class.status,
            error = %crate::storage::mask_sensitive(&message),
            "Operation failed"
        );
        GatewayResponse::error(class.status, class.code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditPolicy;
    use crate::storage::{
        AuditRecord, AuditStore, DescriptorStore, GatewayDatabase, StoreError, StoreResult,
    };
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const CALLER: &str = "H92006568";

    struct Fixture {
        _temp: TempDir,
        db: Arc<GatewayDatabase>,
        executor: OperationExecutor,
    }

    fn fixture(policy: AuditPolicy) -> Fixture {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(GatewayDatabase::open(&temp.path().join("gateway.redb")).unwrap());
        db.upsert_descriptor(&OperationDescriptor::new(
            CALLER,
            OperationKind::MemberLookup,
            "secret",
            "C1",
        ))
        .unwrap();
        let executor = OperationExecutor::new(
            AuthorizationGate::new(db.clone()),
            AuditLogger::new(db.clone(), policy),
        );
        Fixture {
            _temp: temp,
            db,
            executor,
        }
    }

    fn member_request() -> OperationRequest {
        OperationRequest::new(CALLER)
            .with_field("lastname", "Dela Cruz")
            .with_field("firstname", "Juan")
            .with_field("birthdate", "01-01-2000")
    }

    fn only_record(db: &GatewayDatabase) -> AuditRecord {
        let mut records = db.list_audit_records().unwrap();
        assert_eq!(records.len(), 1, "expected exactly one audit record");
        records.remove(0)
    }

    #[test]
    fn timing_restarts_when_audit_opens() {
        let mut invocation = Invocation::new();
        let Some(earlier) = Instant::now().checked_sub(Duration::from_secs(5)) else {
            return;
        };
        invocation.started = earlier;
        invocation.enter(Phase::Authorizing);
        assert_eq!(invocation.started, earlier);

        invocation.enter(Phase::LoggingPending);
        assert!(invocation.started > earlier);
        assert!(invocation.elapsed_ms() < 1000);
    }

    #[tokio::test]
    async fn success_closes_record_as_success() {
        let f = fixture(AuditPolicy::all());
        let response = f
            .executor
            .execute("member-pin", Some(member_request()), &CancellationToken::new(), |call| async move {
                assert_eq!(call.kind, OperationKind::MemberLookup);
                assert_eq!(call.descriptor.caller_code, "C1");
                Ok(Some(json!({"pin": "123456789012"})))
            })
            .await;

        assert!(response.success);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.error_code, "");
        assert_eq!(response.data, json!({"pin": "123456789012"}));

        let record = only_record(&f.db);
        assert_eq!(record.status, AuditStatus::Success);
        assert_eq!(record.response_payload.as_deref(), Some(r#"{"pin":"************"}"#));
        assert!(record.responded_at.unwrap() >= record.requested_at);
    }

    #[tokio::test]
    async fn null_result_is_no_data_and_still_success() {
        let f = fixture(AuditPolicy::all());
        let response = f
            .executor
            .execute("member-pin", Some(member_request()), &CancellationToken::new(), |_| async {
                Ok(None)
            })
            .await;

        assert!(response.success);
        assert_eq!(response.data["success"], json!(false));
        assert_eq!(response.data["message"], json!(NO_DATA_MESSAGE));
        assert_eq!(only_record(&f.db).status, AuditStatus::Success);
    }

    #[tokio::test]
    async fn unregistered_caller_is_denied_without_calling_domain() {
        let f = fixture(AuditPolicy::all());
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        // Invalid fields too: authorization is decided first.
        let request = OperationRequest::new("H00000000");

        let response = f
            .executor
            .execute("member-pin", Some(request), &CancellationToken::new(), |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await;

        assert!(!response.success);
        assert_eq!(response.status_code, 503);
        assert_eq!(response.error_code, "AUTH_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(f.db.list_audit_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn validation_failures_open_no_record() {
        let f = fixture(AuditPolicy::all());

        let missing = f
            .executor
            .execute("member-pin", None, &CancellationToken::new(), |_| async { Ok(None) })
            .await;
        assert_eq!(missing.status_code, 400);
        assert_eq!(missing.error_code, "VALIDATION_ERROR");

        let blank_caller = f
            .executor
            .execute("member-pin", Some(OperationRequest::new("")), &CancellationToken::new(), |_| async {
                Ok(None)
            })
            .await;
        assert_eq!(blank_caller.error_code, "VALIDATION_ERROR");

        let unknown = f
            .executor
            .execute("teleport", Some(member_request()), &CancellationToken::new(), |_| async {
                Ok(None)
            })
            .await;
        assert_eq!(unknown.error_code, "VALIDATION_ERROR");

        let incomplete = OperationRequest::new(CALLER).with_field("lastname", "Dela Cruz");
        let response = f
            .executor
            .execute("member-pin", Some(incomplete), &CancellationToken::new(), |_| async {
                Ok(None)
            })
            .await;
        assert_eq!(response.error_code, "VALIDATION_ERROR");
        assert!(response.message.starts_with("firstname is required (elapsed "));

        assert!(f.db.list_audit_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registered_caller_with_blank_lastname_is_validation_error() {
        let f = fixture(AuditPolicy::all());
        let request = member_request().with_field("lastname", "");
        let response = f
            .executor
            .execute("member-pin", Some(request), &CancellationToken::new(), |_| async {
                Ok(Some(json!("unreachable")))
            })
            .await;

        assert_eq!(response.status_code, 400);
        assert_eq!(response.error_code, "VALIDATION_ERROR");
        assert!(f.db.list_audit_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn domain_failure_closes_record_and_tags_message() {
        let f = fixture(AuditPolicy::all());
        let response = f
            .executor
            .execute("member-pin", Some(member_request()), &CancellationToken::new(), |_| async {
                Err(GatewayError::ExternalApi("member 123456789012 not eligible".into()))
            })
            .await;

        assert!(!response.success);
        assert_eq!(response.status_code, 502);
        assert_eq!(response.error_code, "EXT_API_ERROR");

        let record = only_record(&f.db);
        assert_eq!(record.status, AuditStatus::Failed);
        let stored = record.response_payload.unwrap();
        assert!(stored.starts_with("member ************ not eligible (elapsed "));
        assert!(response.message.contains("(elapsed "));
        assert!(response.message.ends_with(&format!("[audit: {}]", record.id)));
    }

    #[tokio::test]
    async fn excluded_operation_runs_without_audit() {
        let f = fixture(AuditPolicy::only([OperationKind::ClaimUpload]));
        let response = f
            .executor
            .execute("member-pin", Some(member_request()), &CancellationToken::new(), |_| async {
                Err(GatewayError::Timeout("slow".into()))
            })
            .await;

        assert_eq!(response.status_code, 408);
        assert!(!response.message.contains("[audit:"));
        assert!(f.db.list_audit_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_fails_and_closes_record() {
        let f = fixture(AuditPolicy::all());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let response = f
            .executor
            .execute("member-pin", Some(member_request()), &cancel, |_| async move {
                trigger.cancel();
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Some(json!("late")))
            })
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.error_code, "INTERNAL_ERROR");
        let record = only_record(&f.db);
        assert_eq!(record.status, AuditStatus::Failed);
        assert!(record.response_payload.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn string_results_are_stored_verbatim() {
        let f = fixture(AuditPolicy::all());
        f.executor
            .execute("member-pin", Some(member_request()), &CancellationToken::new(), |_| async {
                Ok(Some(json!("<PIN>123</PIN>")))
            })
            .await;
        assert_eq!(
            only_record(&f.db).response_payload.as_deref(),
            Some("<PIN>123</PIN>")
        );
    }

    /// Audit store whose terminal close always fails.
    struct FailingClose {
        inner: Arc<GatewayDatabase>,
    }

    impl AuditStore for FailingClose {
        fn insert_audit(&self, record: &AuditRecord) -> StoreResult<()> {
            self.inner.insert_audit(record)
        }

        fn close_audit(
            &self,
            id: &str,
            status: AuditStatus,
            response_payload: &str,
            responded_at: DateTime<Utc>,
        ) -> StoreResult<AuditRecord> {
            if status == AuditStatus::Success {
                return Err(StoreError::Invalid("disk full".into()));
            }
            self.inner.close_audit(id, status, response_payload, responded_at)
        }

        fn audit_record(&self, id: &str) -> StoreResult<Option<AuditRecord>> {
            self.inner.audit_record(id)
        }

        fn list_audit_records(&self) -> StoreResult<Vec<AuditRecord>> {
            self.inner.list_audit_records()
        }
    }

    #[tokio::test]
    async fn failed_success_close_becomes_database_error() {
        let f = fixture(AuditPolicy::all());
        let executor = OperationExecutor::new(
            AuthorizationGate::new(f.db.clone()),
            AuditLogger::new(
                Arc::new(FailingClose {
                    inner: f.db.clone(),
                }),
                AuditPolicy::all(),
            ),
        );

        let response = executor
            .execute("member-pin", Some(member_request()), &CancellationToken::new(), |_| async {
                Ok(Some(json!({"ok": true})))
            })
            .await;

        assert!(!response.success);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.error_code, "DATABASE_ERROR");
        let record = only_record(&f.db);
        assert_eq!(record.status, AuditStatus::Failed);
        assert!(record.response_payload.unwrap().contains("disk full"));
    }
}
