// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structural request checks.
//!
//! Split in two: [`validate_common`] runs before authorization, and
//! [`validate_fields`] runs after it so that an unregistered caller is
//! always refused as such.

use crate::error::{GatewayError, GatewayResult};
use crate::models::{OperationKind, OperationRequest, DOCUMENT_FIELD};

/// One required-field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Field(&'static str),
    /// At least one of the listed fields.
    AnyOf(&'static [&'static str]),
}

use Requirement::{AnyOf, Field};

/// Required fields per operation kind.
pub fn requirements(kind: OperationKind) -> &'static [Requirement] {
    match kind {
        OperationKind::ServerVersion
        | OperationKind::ServerDateTime
        | OperationKind::DbServerDateTime => &[],
        OperationKind::MemberLookup | OperationKind::DoctorPanLookup => &[
            Field("lastname"),
            Field("firstname"),
            Field("birthdate"),
        ],
        OperationKind::EmployerSearch => &[Field("employerName")],
        OperationKind::EligibilityCheck => &[Field("memberPin"), Field("admissionDate")],
        OperationKind::DoctorAccreditation => &[Field("doctorPan"), Field("admissionDate")],
        OperationKind::CaseRateSearch => &[AnyOf(&["icdCode", "rvsCode"])],
        OperationKind::ClaimUpload
        | OperationKind::ClaimFileCheck
        | OperationKind::DrugValidation
        | OperationKind::EncryptDocument
        | OperationKind::DecryptDocument => &[Field(DOCUMENT_FIELD)],
        OperationKind::UploadedClaimsMap => &[Field("receiptTicketNumber")],
        OperationKind::ClaimStatus => &[Field("seriesLhioNo")],
        OperationKind::VoucherDetails => &[Field("voucherNo")],
        OperationKind::AtcValidation => &[Field("atcCode")],
        OperationKind::ConfinementHistory => &[Field("memberPin")],
        OperationKind::EmployerContribution => &[Field("employerNo")],
    }
}

/// Resolve an operation name from the request path.
pub fn resolve_operation(name: &str) -> GatewayResult<OperationKind> {
    OperationKind::from_wire_name(name)
        .ok_or_else(|| GatewayError::Validation(format!("unknown operation: {}", name.trim())))
}

/// Checks shared by every operation: a request body and a caller id.
pub fn validate_common(request: Option<OperationRequest>) -> GatewayResult<OperationRequest> {
    let mut request =
        request.ok_or_else(|| GatewayError::Validation("request body is required".to_string()))?;

    let caller_id = request.caller_id.trim();
    if caller_id.is_empty() {
        return Err(GatewayError::Validation("callerId is required".to_string()));
    }
    request.caller_id = caller_id.to_string();
    Ok(request)
}

/// Per-operation required fields.
pub fn validate_fields(kind: OperationKind, request: &OperationRequest) -> GatewayResult<()> {
    for requirement in requirements(kind) {
        match requirement {
            Field(name) if !is_present(request, name) => {
                return Err(GatewayError::Validation(format!("{name} is required")));
            }
            AnyOf(names) if !names.iter().any(|name| is_present(request, name)) => {
                return Err(GatewayError::Validation(format!(
                    "one of {} is required",
                    names.join(", ")
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_present(request: &OperationRequest, name: &str) -> bool {
    if name == DOCUMENT_FIELD {
        request.document().is_some()
    } else {
        request.has_value(name)
    }
}
