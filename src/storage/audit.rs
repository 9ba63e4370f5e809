// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for remote operation invocations.
//!
//! Every logged invocation gets exactly one record: opened `Pending` before
//! the remote call, closed once as `Success` or `Failed`. Payloads and error
//! texts are masked before they reach storage.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AuditStore, StoreResult};
use crate::config::AuditPolicy;
use crate::models::OperationKind;

/// Runs of twelve digits (member and claim identifiers).
static SENSITIVE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{12}").expect("twelve-digit pattern is valid"));

/// Replace every run of 12 consecutive digits with `*` of equal length.
pub fn mask_sensitive(text: &str) -> String {
    SENSITIVE_DIGITS
        .replace_all(text, |caps: &regex_lite::Captures<'_>| "*".repeat(caps[0].len()))
        .into_owned()
}

/// Lifecycle state of an audit record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Success,
    Failed,
}

impl AuditStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AuditStatus::Pending)
    }
}

/// What was invoked, by whom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationRef {
    pub caller_id: String,
    pub operation: OperationKind,
}

/// One audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record ID, surfaced to callers as a trace tag.
    pub id: String,
    pub operation_ref: OperationRef,
    /// Masked request payload.
    pub request_payload: String,
    /// Masked response payload or error text, set on close.
    pub response_payload: Option<String>,
    pub status: AuditStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    /// Billing units derived from the request.
    pub chargeable_item_count: u32,
}

/// Token for a record opened by [`AuditLogger::open`].
///
/// The store refuses a second terminal transition, so closing the same
/// handle twice fails with `AlreadyClosed`.
#[derive(Debug)]
pub struct AuditHandle {
    id: String,
}

impl AuditHandle {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Opens and closes audit records according to the configured policy.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    policy: AuditPolicy,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>, policy: AuditPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Open a `Pending` record, or return `None` when the operation kind is
    /// not logged.
    pub fn open(
        &self,
        caller_id: &str,
        operation: OperationKind,
        request_payload: &str,
        chargeable_items: u32,
    ) -> StoreResult<Option<AuditHandle>> {
        if !self.policy.is_logged(operation) {
            return Ok(None);
        }

        let record = AuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            operation_ref: OperationRef {
                caller_id: caller_id.to_string(),
                operation,
            },
            request_payload: mask_sensitive(request_payload),
            response_payload: None,
            status: AuditStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            chargeable_item_count: chargeable_items,
        };
        self.store.insert_audit(&record)?;

        debug!(audit_id = %record.id, operation = %operation, "Audit record opened");
        Ok(Some(AuditHandle { id: record.id }))
    }

    /// Close the record with a terminal status and a masked payload or
    /// error text.
    pub fn close(
        &self,
        handle: &AuditHandle,
        payload_or_error: &str,
        status: AuditStatus,
    ) -> StoreResult<AuditRecord> {
        let record =
            self.store
                .close_audit(&handle.id, status, &mask_sensitive(payload_or_error), Utc::now())?;
        debug!(audit_id = %record.id, status = ?record.status, "Audit record closed");
        Ok(record)
    }

    /// Close as `Failed`, logging instead of returning a storage error.
    ///
    /// Used on paths that are already failing.
    pub fn close_failed(&self, handle: &AuditHandle, error_text: &str) {
        if let Err(e) = self.close(handle, error_text, AuditStatus::Failed) {
            warn!(audit_id = %handle.id, error = %e, "Failed to close audit record as failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GatewayDatabase, StoreError};
    use tempfile::TempDir;

    fn setup(policy: AuditPolicy) -> (TempDir, Arc<GatewayDatabase>, AuditLogger) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(GatewayDatabase::open(&temp.path().join("gateway.redb")).unwrap());
        let logger = AuditLogger::new(db.clone(), policy);
        (temp, db, logger)
    }

    #[test]
    fn masks_twelve_digit_runs() {
        assert_eq!(mask_sensitive("123456789012"), "************");
        assert_eq!(
            mask_sensitive("pin=123456789012;claim=12345"),
            "pin=************;claim=12345"
        );
        // Longer runs mask every complete group of twelve.
        assert_eq!(mask_sensitive("1234567890123"), "************3");
        assert_eq!(mask_sensitive("no digits here"), "no digits here");
    }

    #[test]
    fn open_then_close_success() {
        let (_temp, db, logger) = setup(AuditPolicy::all());

        let handle = logger
            .open("H1", OperationKind::MemberLookup, r#"{"pin":"123456789012"}"#, 1)
            .unwrap()
            .unwrap();
        let id = handle.id().to_string();

        let pending = db.audit_record(&id).unwrap().unwrap();
        assert_eq!(pending.status, AuditStatus::Pending);
        assert_eq!(pending.request_payload, r#"{"pin":"************"}"#);
        assert!(pending.responded_at.is_none());

        let closed = logger
            .close(&handle, "member 123456789012 found", AuditStatus::Success)
            .unwrap();
        assert_eq!(closed.status, AuditStatus::Success);
        assert_eq!(
            closed.response_payload.as_deref(),
            Some("member ************ found")
        );
        assert!(closed.responded_at.unwrap() >= closed.requested_at);
    }

    #[test]
    fn excluded_kind_opens_nothing() {
        let (_temp, db, logger) = setup(AuditPolicy::only([OperationKind::ClaimUpload]));

        let handle = logger.open("H1", OperationKind::ServerVersion, "{}", 1).unwrap();
        assert!(handle.is_none());
        assert!(db.list_audit_records().unwrap().is_empty());
    }

    #[test]
    fn disabled_policy_opens_nothing() {
        let (_temp, db, logger) = setup(AuditPolicy::disabled());
        assert!(logger.open("H1", OperationKind::ClaimUpload, "{}", 1).unwrap().is_none());
        assert!(db.list_audit_records().unwrap().is_empty());
    }

    #[test]
    fn close_failed_masks_error_text() {
        let (_temp, db, logger) = setup(AuditPolicy::all());
        let handle = logger.open("H1", OperationKind::ClaimStatus, "{}", 2).unwrap().unwrap();
        let id = handle.id().to_string();

        logger.close_failed(&handle, "remote rejected 123456789012 (elapsed 5 ms)");

        let record = db.audit_record(&id).unwrap().unwrap();
        assert_eq!(record.status, AuditStatus::Failed);
        assert_eq!(record.chargeable_item_count, 2);
        assert_eq!(
            record.response_payload.as_deref(),
            Some("remote rejected ************ (elapsed 5 ms)")
        );
    }

    #[test]
    fn store_refuses_second_transition() {
        let (_temp, db, logger) = setup(AuditPolicy::all());
        let handle = logger.open("H1", OperationKind::ClaimStatus, "{}", 1).unwrap().unwrap();
        let id = handle.id().to_string();
        logger.close(&handle, "ok", AuditStatus::Success).unwrap();

        let err = logger.close(&handle, "again", AuditStatus::Failed).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClosed(_)));
        assert_eq!(db.audit_record(&id).unwrap().unwrap().status, AuditStatus::Success);
    }
}
