// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed envelope wire format shared with the remote claims API.
//!
//! ## Scheme
//!
//! - key: `SHA-256(UTF-8(secret))`, used directly as the AES-256 key
//! - iv: 16 random bytes per seal
//! - cipher: AES-256-CBC, plaintext zero-padded to the block size
//! - hash: hex SHA-256 of the plaintext, informational only
//!
//! Opening does not strip padding and does not check integrity. The remote
//! side depends on both behaviours, so they are reproduced byte for byte.
//! The executor only sees [`EnvelopeCipher`], so an authenticated scheme can
//! replace this one later.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64ct::{Base64, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{GatewayError, GatewayResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_SIZE: usize = 16;
const IV_LEN: usize = 16;

/// Seals and opens envelopes.
pub trait EnvelopeCipher: Send + Sync {
    /// Encrypt `plaintext` under `secret` into a wire envelope.
    fn seal(&self, plaintext: &str, secret: &str, mime_type: &str) -> GatewayResult<Envelope>;

    /// Decrypt a raw envelope or a `{success, message, result}` wrapper.
    fn open(&self, input: &str, secret: &str) -> GatewayResult<String>;
}

/// The JSON envelope on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub doc_mime_type: String,
    /// Hex SHA-256 of the plaintext.
    pub hash: String,
    /// Always empty.
    pub key1: String,
    /// Always empty.
    pub key2: String,
    /// Base64 of the 16-byte IV.
    pub iv: String,
    /// Base64 of the ciphertext.
    pub doc: String,
}

impl Envelope {
    pub fn to_json(&self) -> GatewayResult<String> {
        serde_json::to_string(self)
            .map_err(|e| GatewayError::Internal(format!("failed to serialize envelope: {e}")))
    }
}

// =============================================================================
// Inbound replies
// =============================================================================

/// Remote reply decoded into what the gateway acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundReply {
    /// `success=true` (or an unwrapped body); the payload may be `Null`.
    Success(Value),
    /// `success=false` with the remote message.
    Failure(String),
}

#[derive(Debug, Deserialize)]
struct WrappedReply {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

impl InboundReply {
    /// Second decoding step: classify an already parsed JSON body.
    ///
    /// Bodies carrying a `success` flag are wrappers; anything else is taken
    /// as an unwrapped success payload.
    pub fn from_value(value: Value) -> GatewayResult<Self> {
        let is_wrapper = value.as_object().is_some_and(|o| o.contains_key("success"));
        if !is_wrapper {
            return Ok(InboundReply::Success(value));
        }

        let wrapped: WrappedReply = serde_json::from_value(value)
            .map_err(|e| GatewayError::Format(format!("malformed reply wrapper: {e}")))?;
        if wrapped.success {
            Ok(InboundReply::Success(wrapped.result.unwrap_or(Value::Null)))
        } else {
            Ok(InboundReply::Failure(
                wrapped
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "remote call failed without a message".to_string()),
            ))
        }
    }

    /// Both decoding steps from raw text.
    pub fn parse(body: &str) -> GatewayResult<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| GatewayError::Format(format!("reply is not valid JSON: {e}")))?;
        Self::from_value(value)
    }
}

/// `doc` and `iv` of a sealed payload, still base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedParts {
    pub doc: String,
    pub iv: String,
}

impl SealedParts {
    /// Pick `doc`/`iv` out of a JSON object, if both are strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        let doc = value.get("doc")?.as_str()?;
        let iv = value.get("iv")?.as_str()?;
        Some(Self {
            doc: doc.to_string(),
            iv: iv.to_string(),
        })
    }

    /// Locate the sealed parts in a raw envelope or a reply wrapper.
    pub fn locate(input: &str) -> GatewayResult<Self> {
        if input.trim().is_empty() {
            return Err(GatewayError::Validation("envelope input is empty".to_string()));
        }
        let value: Value = serde_json::from_str(input)
            .map_err(|e| GatewayError::Format(format!("envelope is not valid JSON: {e}")))?;

        if let Some(parts) = Self::from_value(&value) {
            return Ok(parts);
        }
        match InboundReply::from_value(value)? {
            InboundReply::Failure(message) => Err(GatewayError::ExternalApi(message)),
            InboundReply::Success(result) => Self::from_value(&result).ok_or_else(|| {
                GatewayError::Format("envelope is missing 'doc' or 'iv'".to_string())
            }),
        }
    }
}

// =============================================================================
// AES-256-CBC with zero padding
// =============================================================================

/// The interoperable envelope cipher.
pub struct ZeroPaddedAesCbc {
    rng: SystemRandom,
}

impl Default for ZeroPaddedAesCbc {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroPaddedAesCbc {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    fn random_iv(&self) -> GatewayResult<[u8; IV_LEN]> {
        let mut iv = [0u8; IV_LEN];
        self.rng
            .fill(&mut iv)
            .map_err(|_| GatewayError::Internal("failed to generate envelope IV".to_string()))?;
        Ok(iv)
    }

    /// Encrypt with an explicit IV.
    pub fn seal_with_iv(
        &self,
        plaintext: &str,
        secret: &str,
        mime_type: &str,
        iv: &[u8; IV_LEN],
    ) -> GatewayResult<Envelope> {
        let key = derive_key(secret);
        let padded = zero_pad(plaintext.as_bytes());

        let ciphertext = Aes256CbcEnc::new_from_slices(&key, iv)
            .map_err(|e| GatewayError::Internal(format!("cipher init failed: {e}")))?
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        Ok(Envelope {
            doc_mime_type: mime_type.to_string(),
            hash: hex::encode(Sha256::digest(plaintext.as_bytes())),
            key1: String::new(),
            key2: String::new(),
            iv: Base64::encode_string(iv),
            doc: Base64::encode_string(&ciphertext),
        })
    }

    /// Decrypt already located sealed parts.
    pub fn open_parts(&self, parts: &SealedParts, secret: &str) -> GatewayResult<String> {
        let ciphertext = decode_base64("doc", &parts.doc)?;
        let iv = decode_base64("iv", &parts.iv)?;
        if iv.len() != IV_LEN {
            return Err(GatewayError::Format(format!(
                "iv must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }

        let key = derive_key(secret);
        let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
            .map_err(|e| GatewayError::Format(format!("cipher init failed: {e}")))?
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|_| {
                GatewayError::Format(format!(
                    "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
                    ciphertext.len()
                ))
            })?;

        // Padding zeros are part of the result. Invalid UTF-8 from a wrong
        // key becomes replacement characters.
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}

impl EnvelopeCipher for ZeroPaddedAesCbc {
    fn seal(&self, plaintext: &str, secret: &str, mime_type: &str) -> GatewayResult<Envelope> {
        let iv = self.random_iv()?;
        self.seal_with_iv(plaintext, secret, mime_type, &iv)
    }

    fn open(&self, input: &str, secret: &str) -> GatewayResult<String> {
        let parts = SealedParts::locate(input)?;
        self.open_parts(&parts, secret)
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// Pad with `0x00` to the next block boundary; aligned input is unchanged.
fn zero_pad(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    let remainder = padded.len() % BLOCK_SIZE;
    if remainder != 0 {
        padded.resize(padded.len() + BLOCK_SIZE - remainder, 0);
    }
    padded
}

fn decode_base64(field: &str, encoded: &str) -> GatewayResult<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Base64::decode_vec(&compact)
        .map_err(|e| GatewayError::Format(format!("'{field}' is not valid base64: {e}")))
}
