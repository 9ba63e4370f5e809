// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway error taxonomy and its classification into `(status, code)`.
//!
//! Errors travel unmodified up to the executor, which classifies them once.

use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Structurally invalid request.
    #[error("{0}")]
    Validation(String),

    /// Caller is not registered (or not active) for the operation.
    #[error("{0}")]
    AccessDenied(String),

    /// Caller is registered but not allowed to perform the action.
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed base64, JSON, or ciphertext.
    #[error("{0}")]
    Format(String),

    #[error("database error: {0}")]
    Persistence(#[from] StoreError),

    /// Remote API answered with an error.
    #[error("{0}")]
    ExternalApi(String),

    /// Remote API could not be reached.
    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

/// Result of classifying an error for the caller-facing envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClass {
    pub status: u16,
    pub code: &'static str,
}

impl GatewayError {
    /// Map a transport failure, separating timeouts from other network
    /// errors.
    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        let context = context.into();
        if source.is_timeout() {
            GatewayError::Timeout(format!("{context}: request timed out"))
        } else {
            GatewayError::Network { context, source }
        }
    }

    /// Total mapping from error kind to HTTP-like status and error code.
    ///
    /// `AccessDenied` maps to 503, not 403; existing callers depend on it.
    pub fn classify(&self) -> ErrorClass {
        let (status, code) = match self {
            GatewayError::Validation(_) => (400, "VALIDATION_ERROR"),
            GatewayError::AccessDenied(_) => (503, "AUTH_ERROR"),
            GatewayError::Unauthorized(_) => (403, "ACCESS_DENIED"),
            GatewayError::Format(_) => (400, "FORMAT_ERROR"),
            GatewayError::Persistence(_) => (400, "DATABASE_ERROR"),
            GatewayError::ExternalApi(_) | GatewayError::Network { .. } => (502, "EXT_API_ERROR"),
            GatewayError::Timeout(_) => (408, "TIMEOUT_ERROR"),
            GatewayError::Cancelled | GatewayError::Internal(_) => (500, "INTERNAL_ERROR"),
        };
        ErrorClass { status, code }
    }

    /// Message of the deepest error in the `source()` chain.
    pub fn innermost_message(&self) -> String {
        let mut current: &dyn std::error::Error = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table_is_stable() {
        let cases = [
            (GatewayError::Validation("v".into()), 400, "VALIDATION_ERROR"),
            (GatewayError::AccessDenied("a".into()), 503, "AUTH_ERROR"),
            (GatewayError::Unauthorized("u".into()), 403, "ACCESS_DENIED"),
            (GatewayError::Format("f".into()), 400, "FORMAT_ERROR"),
            (
                GatewayError::Persistence(StoreError::NotFound("x".into())),
                400,
                "DATABASE_ERROR",
            ),
            (GatewayError::ExternalApi("e".into()), 502, "EXT_API_ERROR"),
            (GatewayError::Timeout("t".into()), 408, "TIMEOUT_ERROR"),
            (GatewayError::Cancelled, 500, "INTERNAL_ERROR"),
            (GatewayError::Internal("i".into()), 500, "INTERNAL_ERROR"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.classify(), ErrorClass { status, code }, "{err:?}");
        }
    }

    #[test]
    fn innermost_message_walks_source_chain() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let expected = json_err.to_string();
        let err = GatewayError::Persistence(StoreError::Serde(json_err));

        assert_eq!(err.innermost_message(), expected);
        assert!(err.to_string().starts_with("database error:"));
    }

    #[test]
    fn innermost_message_of_leaf_is_its_display() {
        let err = GatewayError::Validation("lastname is required".into());
        assert_eq!(err.innermost_message(), "lastname is required");
    }
}
