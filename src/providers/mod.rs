// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound integrations.

pub mod claims_api;

pub use claims_api::{build_http_client, CallCredentials, ClaimsApiClient};
