// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-caller authorization against registered operation descriptors.

use std::sync::Arc;

use tracing::info;

use crate::error::{GatewayError, GatewayResult};
use crate::models::OperationKind;
use crate::storage::{DescriptorStore, OperationDescriptor};

/// Grants an invocation only to callers with an active descriptor for the
/// operation.
#[derive(Clone)]
pub struct AuthorizationGate {
    store: Arc<dyn DescriptorStore>,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn DescriptorStore>) -> Self {
        Self { store }
    }

    /// The active descriptor for `(caller_id, operation)`.
    ///
    /// Missing and inactive descriptors are both `AccessDenied`; a store
    /// failure is a persistence error.
    pub fn authorize(
        &self,
        caller_id: &str,
        operation: OperationKind,
    ) -> GatewayResult<OperationDescriptor> {
        match self.store.descriptor(caller_id, operation)? {
            Some(descriptor) if descriptor.is_active => Ok(descriptor),
            Some(_) => {
                info!(caller_id = %caller_id, operation = %operation, "Descriptor inactive");
                Err(access_denied(caller_id, operation))
            }
            None => {
                info!(caller_id = %caller_id, operation = %operation, "No descriptor registered");
                Err(access_denied(caller_id, operation))
            }
        }
    }
}

fn access_denied(caller_id: &str, operation: OperationKind) -> GatewayError {
    GatewayError::AccessDenied(format!(
        "caller {caller_id} is not authorized for operation {operation}"
    ))
}
