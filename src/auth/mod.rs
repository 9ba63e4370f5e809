// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Caller Authorization and Remote Credentials
//!
//! Two unrelated directions of trust:
//!
//! 1. **Inbound**: [`AuthorizationGate`] decides whether a caller may invoke
//!    an operation, based on its registered descriptor.
//! 2. **Outbound**: [`TokenProvider`] obtains the bearer token the remote
//!    claims API expects on every call.
//!
//! End users are not authenticated here; callers are identified by their
//! accreditation code only.

pub mod gate;
pub mod token;

pub use gate::AuthorizationGate;
pub use token::TokenProvider;
