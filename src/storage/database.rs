// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded gateway database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `operation_descriptors`: `caller_id|operation` → serialized OperationDescriptor
//! - `audit_records`: audit id → serialized AuditRecord

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::audit::{AuditRecord, AuditStatus};
use super::descriptors::{descriptor_key, OperationDescriptor, KEY_SEPARATOR};
use super::{AuditStore, DescriptorStore, StoreError, StoreResult};
use crate::models::OperationKind;

// =============================================================================
// Table Definitions
// =============================================================================

/// Descriptors keyed by `caller_id|operation`. Keys of one caller are
/// contiguous, so a caller's descriptors are a single range scan.
const DESCRIPTORS: TableDefinition<&str, &[u8]> = TableDefinition::new("operation_descriptors");

/// Audit records keyed by their UUID.
const AUDIT_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_records");

// =============================================================================
// Key Helpers
// =============================================================================

/// Inclusive start of a caller's key range.
fn caller_prefix(caller_id: &str) -> String {
    format!("{caller_id}{KEY_SEPARATOR}")
}

/// Exclusive end of a caller's key range: the separator's successor.
fn caller_prefix_end(caller_id: &str) -> String {
    let next = char::from_u32(KEY_SEPARATOR as u32 + 1).unwrap_or(char::MAX);
    format!("{caller_id}{next}")
}

// =============================================================================
// GatewayDatabase
// =============================================================================

/// Embedded ACID store for descriptors and audit records.
pub struct GatewayDatabase {
    db: Database,
}

impl GatewayDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DESCRIPTORS)?;
            let _ = write_txn.open_table(AUDIT_RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl DescriptorStore for GatewayDatabase {
    fn descriptor(
        &self,
        caller_id: &str,
        operation: OperationKind,
    ) -> StoreResult<Option<OperationDescriptor>> {
        let key = descriptor_key(caller_id, operation);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DESCRIPTORS)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn active_descriptor_for_caller(
        &self,
        caller_id: &str,
    ) -> StoreResult<Option<OperationDescriptor>> {
        let start = caller_prefix(caller_id);
        let end = caller_prefix_end(caller_id);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DESCRIPTORS)?;
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            let descriptor: OperationDescriptor = serde_json::from_slice(value.value())?;
            if descriptor.is_active {
                return Ok(Some(descriptor));
            }
        }
        Ok(None)
    }

    fn upsert_descriptor(&self, descriptor: &OperationDescriptor) -> StoreResult<()> {
        descriptor.validate()?;
        let key = descriptor.storage_key();
        let json = serde_json::to_vec(descriptor)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DESCRIPTORS)?;
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl AuditStore for GatewayDatabase {
    fn insert_audit(&self, record: &AuditRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_RECORDS)?;
            if table.get(record.id.as_str())?.is_some() {
                return Err(StoreError::Invalid(format!(
                    "audit record {} already exists",
                    record.id
                )));
            }
            table.insert(record.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn close_audit(
        &self,
        id: &str,
        status: AuditStatus,
        response_payload: &str,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<AuditRecord> {
        if !status.is_terminal() {
            return Err(StoreError::Invalid(format!(
                "audit record {id} cannot be closed as {status:?}"
            )));
        }

        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(AUDIT_RECORDS)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = table
                    .get(id)?
                    .ok_or_else(|| StoreError::NotFound(format!("audit record {id}")))?;
                existing.value().to_vec()
            };

            let mut record: AuditRecord = serde_json::from_slice(&existing_bytes)?;
            if record.status.is_terminal() {
                return Err(StoreError::AlreadyClosed(id.to_string()));
            }
            record.status = status;
            record.response_payload = Some(response_payload.to_string());
            record.responded_at = Some(responded_at);

            let json = serde_json::to_vec(&record)?;
            table.insert(id, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    fn audit_record(&self, id: &str) -> StoreResult<Option<AuditRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_RECORDS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn list_audit_records(&self) -> StoreResult<Vec<AuditRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_RECORDS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice::<AuditRecord>(value.value())?);
        }
        records.sort_by_key(|r| r.requested_at);
        Ok(records)
    }
}
