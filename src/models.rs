// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Data Models
//!
//! Request and response structures shared by the executor, the remote
//! operation functions and the HTTP surface.
//!
//! ## Model Categories
//!
//! - **Operation kinds**: the closed catalogue of remote operations
//! - **Requests**: the caller-supplied parameters of one invocation
//! - **Responses**: the uniform envelope every invocation returns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Operation Kinds
// =============================================================================

/// How an operation's payload travels to the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// The request parameters are sealed as a JSON document.
    SealedJson,
    /// The caller's `document` field is sealed verbatim as XML.
    Document,
    /// Handled locally with the caller's cipher key; no outbound call.
    Local,
}

/// Every operation the gateway exposes.
///
/// The wire name doubles as the remote API path segment and as the
/// `operationName` stored on descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    ServerVersion,
    #[serde(rename = "server-datetime")]
    ServerDateTime,
    #[serde(rename = "db-server-datetime")]
    DbServerDateTime,
    #[serde(rename = "member-pin")]
    MemberLookup,
    EmployerSearch,
    #[serde(rename = "claim-eligibility")]
    EligibilityCheck,
    DoctorAccreditation,
    #[serde(rename = "doctor-pan")]
    DoctorPanLookup,
    CaseRateSearch,
    ClaimUpload,
    ClaimFileCheck,
    UploadedClaimsMap,
    ClaimStatus,
    VoucherDetails,
    AtcValidation,
    DrugValidation,
    EncryptDocument,
    DecryptDocument,
    ConfinementHistory,
    EmployerContribution,
}

impl OperationKind {
    pub const ALL: [OperationKind; 20] = [
        OperationKind::ServerVersion,
        OperationKind::ServerDateTime,
        OperationKind::DbServerDateTime,
        OperationKind::MemberLookup,
        OperationKind::EmployerSearch,
        OperationKind::EligibilityCheck,
        OperationKind::DoctorAccreditation,
        OperationKind::DoctorPanLookup,
        OperationKind::CaseRateSearch,
        OperationKind::ClaimUpload,
        OperationKind::ClaimFileCheck,
        OperationKind::UploadedClaimsMap,
        OperationKind::ClaimStatus,
        OperationKind::VoucherDetails,
        OperationKind::AtcValidation,
        OperationKind::DrugValidation,
        OperationKind::EncryptDocument,
        OperationKind::DecryptDocument,
        OperationKind::ConfinementHistory,
        OperationKind::EmployerContribution,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            OperationKind::ServerVersion => "server-version",
            OperationKind::ServerDateTime => "server-datetime",
            OperationKind::DbServerDateTime => "db-server-datetime",
            OperationKind::MemberLookup => "member-pin",
            OperationKind::EmployerSearch => "employer-search",
            OperationKind::EligibilityCheck => "claim-eligibility",
            OperationKind::DoctorAccreditation => "doctor-accreditation",
            OperationKind::DoctorPanLookup => "doctor-pan",
            OperationKind::CaseRateSearch => "case-rate-search",
            OperationKind::ClaimUpload => "claim-upload",
            OperationKind::ClaimFileCheck => "claim-file-check",
            OperationKind::UploadedClaimsMap => "uploaded-claims-map",
            OperationKind::ClaimStatus => "claim-status",
            OperationKind::VoucherDetails => "voucher-details",
            OperationKind::AtcValidation => "atc-validation",
            OperationKind::DrugValidation => "drug-validation",
            OperationKind::EncryptDocument => "encrypt-document",
            OperationKind::DecryptDocument => "decrypt-document",
            OperationKind::ConfinementHistory => "confinement-history",
            OperationKind::EmployerContribution => "employer-contribution",
        }
    }

    /// Parse a wire name (case-insensitive).
    pub fn from_wire_name(name: &str) -> Option<OperationKind> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(name))
    }

    pub fn mode(self) -> RequestMode {
        match self {
            OperationKind::ClaimUpload
            | OperationKind::ClaimFileCheck
            | OperationKind::DrugValidation => RequestMode::Document,
            OperationKind::EncryptDocument | OperationKind::DecryptDocument => RequestMode::Local,
            _ => RequestMode::SealedJson,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Field carrying the XML body of document operations.
pub const DOCUMENT_FIELD: &str = "document";

/// Array fields whose length is the billing unit count.
const CHARGEABLE_ARRAY_FIELDS: [&str; 3] = ["claims", "members", "items"];

/// Parameters of one invocation.
///
/// `callerId` is common to every operation; everything else is kept as a
/// loose map and checked per operation kind by the executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Accreditation code of the invoking caller.
    #[serde(default)]
    pub caller_id: String,
    /// Software certificate presented to the token endpoint. Falls back to
    /// the configured certificate when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    /// Operation specific parameters.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OperationRequest {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            ..Self::default()
        }
    }

    /// Builder-style field setter, mostly for tests and internal callers.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// A string field, trimmed; blank strings count as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Whether a field carries a value: a non-blank string or any number
    /// or boolean.
    pub fn has_value(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(Value::String(v)) => !v.trim().is_empty(),
            Some(Value::Number(_) | Value::Bool(_)) => true,
            _ => false,
        }
    }

    /// The raw (untrimmed) document body of document operations.
    pub fn document(&self) -> Option<&str> {
        self.fields
            .get(DOCUMENT_FIELD)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Billing-unit count derived from the request payload.
    pub fn chargeable_items(&self) -> u32 {
        for field in CHARGEABLE_ARRAY_FIELDS {
            if let Some(items) = self.fields.get(field).and_then(Value::as_array) {
                return saturating_count(items.len());
            }
        }
        if let Some(doc) = self.document() {
            return saturating_count(doc.matches("<CLAIM").count()).max(1);
        }
        1
    }
}

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// =============================================================================
// Responses
// =============================================================================

pub const NO_DATA_MESSAGE: &str = "No data found";

/// Uniform caller-facing result of every invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
    /// Empty on success.
    pub error_code: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

impl GatewayResponse {
    pub fn ok(data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error_code: String::new(),
            status_code: 200,
            timestamp: Utc::now(),
        }
    }

    /// Completed call whose remote result was empty.
    ///
    /// The envelope itself succeeds; `data` carries the explicit
    /// `success=false` marker.
    pub fn no_data() -> Self {
        Self::ok(
            serde_json::json!({ "success": false, "message": NO_DATA_MESSAGE }),
            NO_DATA_MESSAGE,
        )
    }

    pub fn error(status_code: u16, error_code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Value::Null,
            error_code: error_code.to_string(),
            status_code,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_round_trip_through_serde() {
        for kind in OperationKind::ALL {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.wire_name()));
            assert_eq!(OperationKind::from_wire_name(kind.wire_name()), Some(kind));
        }
    }

    #[test]
    fn from_wire_name_ignores_case_and_rejects_unknown() {
        assert_eq!(
            OperationKind::from_wire_name(" Member-PIN "),
            Some(OperationKind::MemberLookup)
        );
        assert_eq!(OperationKind::from_wire_name("teleport"), None);
    }

    #[test]
    fn request_deserializes_camel_case_and_keeps_extra_fields() {
        let request: OperationRequest = serde_json::from_value(json!({
            "callerId": "H92006568",
            "lastname": "Dela Cruz",
            "birthdate": "2000-01-01"
        }))
        .unwrap();

        assert_eq!(request.caller_id, "H92006568");
        assert_eq!(request.certificate_id, None);
        assert_eq!(request.text("lastname"), Some("Dela Cruz"));
        assert!(!request.fields.contains_key("callerId"));
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let request = OperationRequest::new("H1").with_field("lastname", "   ");
        assert_eq!(request.text("lastname"), None);
        assert_eq!(request.text("absent"), None);
        assert!(!request.has_value("lastname"));
    }

    #[test]
    fn numbers_and_booleans_have_values() {
        let request = OperationRequest::new("H1")
            .with_field("memberPin", json!(190000000001u64))
            .with_field("isFinal", true)
            .with_field("note", Value::Null)
            .with_field("tags", json!(["a"]));

        assert!(request.has_value("memberPin"));
        assert!(request.has_value("isFinal"));
        assert!(!request.has_value("note"));
        assert!(!request.has_value("tags"));
        assert!(!request.has_value("absent"));
        assert_eq!(request.text("memberPin"), None);
    }

    #[test]
    fn chargeable_items_from_arrays_and_documents() {
        let by_array = OperationRequest::new("H1").with_field("claims", json!([1, 2, 3]));
        assert_eq!(by_array.chargeable_items(), 3);

        let by_doc = OperationRequest::new("H1")
            .with_field(DOCUMENT_FIELD, "<eCLAIMS><CLAIM a='1'/><CLAIM a='2'/></eCLAIMS>");
        assert_eq!(by_doc.chargeable_items(), 2);

        let bare_doc = OperationRequest::new("H1").with_field(DOCUMENT_FIELD, "<x/>");
        assert_eq!(bare_doc.chargeable_items(), 1);

        assert_eq!(OperationRequest::new("H1").chargeable_items(), 1);
    }

    #[test]
    fn item_counts_saturate() {
        assert_eq!(saturating_count(7), 7);
        assert_eq!(saturating_count(u32::MAX as usize), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(saturating_count(usize::MAX), u32::MAX);
    }

    #[test]
    fn response_serializes_uniform_shape() {
        let body = serde_json::to_value(GatewayResponse::error(503, "AUTH_ERROR", "denied")).unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["errorCode"], json!("AUTH_ERROR"));
        assert_eq!(body["statusCode"], json!(503));
        assert!(body["timestamp"].is_string());
        assert!(body["data"].is_null());
    }

    #[test]
    fn no_data_is_a_completed_call_with_explicit_marker() {
        let response = GatewayResponse::no_data();
        assert!(response.success);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.error_code, "");
        assert_eq!(response.data, json!({"success": false, "message": "No data found"}));
    }
}
