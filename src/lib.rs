// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claims Gateway - Sealed-Envelope Gateway for the Remote Claims API
//!
//! Internal callers invoke remote claims operations through this crate.
//! Every payload travels AES-256-CBC sealed under a per-caller secret, and
//! every invocation runs through one validate → authorize → audit → call →
//! classify pipeline that always answers with a uniform envelope.
//!
//! ## Modules
//!
//! - `api` - HTTP surface (Axum)
//! - `auth` - Caller authorization and remote API tokens
//! - `crypto` - Envelope cipher and per-caller key resolution
//! - `executor` - The invocation pipeline
//! - `operations` - The remote operation catalogue
//! - `providers` - HTTP transport to the claims API
//! - `storage` - Descriptors and audit records (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod models;
pub mod operations;
pub mod providers;
pub mod service;
pub mod state;
pub mod storage;
pub mod telemetry;
