// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operation descriptors: the registration of a caller for one operation.
//!
//! Descriptors are provisioned ahead of time (seed file or admin tooling),
//! read-only while serving requests, and only mutated by key/code rotation.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DescriptorStore, StoreError, StoreResult};
use crate::models::OperationKind;

/// Separator of the composite `(caller_id, operation)` key.
pub(crate) const KEY_SEPARATOR: char = '|';

/// Registration of a caller for one operation.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Accreditation code of the caller.
    pub caller_id: String,
    /// Operation the caller may invoke.
    pub operation_name: OperationKind,
    /// Secret the envelope key is derived from.
    pub secret_key: String,
    /// Code the remote API knows the caller by.
    pub caller_code: String,
    /// Inactive descriptors never authorize anything.
    pub is_active: bool,
    /// Set on provisioning and on every rotation.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("caller_id", &self.caller_id)
            .field("operation_name", &self.operation_name)
            .field("secret_key", &"<redacted>")
            .field("caller_code", &self.caller_code)
            .field("is_active", &self.is_active)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl OperationDescriptor {
    /// An active descriptor.
    pub fn new(
        caller_id: impl Into<String>,
        operation_name: OperationKind,
        secret_key: impl Into<String>,
        caller_code: impl Into<String>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            operation_name,
            secret_key: secret_key.into(),
            caller_code: caller_code.into(),
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Composite key under which the descriptor is stored.
    pub fn storage_key(&self) -> String {
        descriptor_key(&self.caller_id, self.operation_name)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.caller_id.trim().is_empty() {
            return Err(StoreError::Invalid("descriptor caller id is empty".to_string()));
        }
        if self.caller_id.contains(KEY_SEPARATOR) {
            return Err(StoreError::Invalid(format!(
                "descriptor caller id '{}' contains '{KEY_SEPARATOR}'",
                self.caller_id
            )));
        }
        Ok(())
    }
}

pub(crate) fn descriptor_key(caller_id: &str, operation: OperationKind) -> String {
    format!("{caller_id}{KEY_SEPARATOR}{}", operation.wire_name())
}

/// Read a JSON array of descriptors from disk.
pub fn load_seed_file(path: impl AsRef<Path>) -> StoreResult<Vec<OperationDescriptor>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StoreError::NotFound(format!("seed file {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Upsert every descriptor, rejecting the whole batch if one is invalid.
pub fn seed_descriptors(
    store: &dyn DescriptorStore,
    descriptors: &[OperationDescriptor],
) -> StoreResult<usize> {
    for descriptor in descriptors {
        descriptor.validate()?;
    }
    for descriptor in descriptors {
        store.upsert_descriptor(descriptor)?;
    }
    Ok(descriptors.len())
}
