// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the gateway: operation descriptors (who may call
//! what, with which cipher secret) and audit records (one per logged
//! invocation).
//!
//! The executor and its collaborators only see the [`DescriptorStore`] and
//! [`AuditStore`] traits. [`GatewayDatabase`] implements both on top of an
//! embedded redb file.
//!
//! ## Table Layout
//!
//! ```text
//! gateway.redb
//!   operation_descriptors   "{caller_id}|{operation}" -> OperationDescriptor (JSON)
//!   audit_records           "{audit_id}"              -> AuditRecord (JSON)
//! ```

pub mod audit;
pub mod database;
pub mod descriptors;

pub use audit::{mask_sensitive, AuditHandle, AuditLogger, AuditRecord, AuditStatus};
pub use database::GatewayDatabase;
pub use descriptors::OperationDescriptor;

use chrono::{DateTime, Utc};

use crate::models::OperationKind;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid record: {0}")]
    Invalid(String),

    /// The audit record already reached a terminal state.
    #[error("audit record {0} is already closed")]
    AlreadyClosed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Indexed access to operation descriptors.
pub trait DescriptorStore: Send + Sync {
    /// The descriptor registered for `(caller_id, operation)`, if any.
    fn descriptor(
        &self,
        caller_id: &str,
        operation: OperationKind,
    ) -> StoreResult<Option<OperationDescriptor>>;

    /// Any active descriptor of the caller, in key order.
    fn active_descriptor_for_caller(
        &self,
        caller_id: &str,
    ) -> StoreResult<Option<OperationDescriptor>>;

    /// Insert or replace the descriptor for its `(caller_id, operation)`.
    fn upsert_descriptor(&self, descriptor: &OperationDescriptor) -> StoreResult<()>;

    /// Replace the cipher secret of an existing descriptor.
    fn rotate_secret(
        &self,
        caller_id: &str,
        operation: OperationKind,
        secret_key: &str,
    ) -> StoreResult<OperationDescriptor> {
        let mut descriptor = self
            .descriptor(caller_id, operation)?
            .ok_or_else(|| StoreError::NotFound(format!("descriptor {caller_id}/{operation}")))?;
        descriptor.secret_key = secret_key.to_string();
        descriptor.updated_at = Utc::now();
        self.upsert_descriptor(&descriptor)?;
        Ok(descriptor)
    }

    /// Replace the caller code of an existing descriptor.
    fn rotate_caller_code(
        &self,
        caller_id: &str,
        operation: OperationKind,
        caller_code: &str,
    ) -> StoreResult<OperationDescriptor> {
        let mut descriptor = self
            .descriptor(caller_id, operation)?
            .ok_or_else(|| StoreError::NotFound(format!("descriptor {caller_id}/{operation}")))?;
        descriptor.caller_code = caller_code.to_string();
        descriptor.updated_at = Utc::now();
        self.upsert_descriptor(&descriptor)?;
        Ok(descriptor)
    }
}

/// Persistence of audit records.
pub trait AuditStore: Send + Sync {
    fn insert_audit(&self, record: &AuditRecord) -> StoreResult<()>;

    /// Move a `Pending` record to `status`, atomically.
    ///
    /// Fails with [`StoreError::AlreadyClosed`] when the record is terminal
    /// and [`StoreError::NotFound`] when it does not exist.
    fn close_audit(
        &self,
        id: &str,
        status: AuditStatus,
        response_payload: &str,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<AuditRecord>;

    fn audit_record(&self, id: &str) -> StoreResult<Option<AuditRecord>>;

    fn list_audit_records(&self) -> StoreResult<Vec<AuditRecord>>;
}
