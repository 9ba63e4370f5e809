// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Cryptography
//!
//! - `envelope` - sealing/opening of the wire envelope
//! - `key_resolver` - per-caller secret lookup with caching

pub mod envelope;
pub mod key_resolver;

pub use envelope::{Envelope, EnvelopeCipher, InboundReply, SealedParts, ZeroPaddedAesCbc};
pub use key_resolver::CipherKeyResolver;
