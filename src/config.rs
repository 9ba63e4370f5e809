// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed [`GatewayConfig`]
//! assembled from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `gateway.redb` | `/data` |
//! | `CLAIMS_API_BASE_URL` | Remote claims API base URL | Required for serving |
//! | `CLAIMS_AUTH_URL` | Token endpoint | `{CLAIMS_API_BASE_URL}/auth/token` |
//! | `SOFTWARE_CERTIFICATE_ID` | Certificate id sent with token requests | empty |
//! | `DEFAULT_CIPHER_KEY` | Fallback cipher secret | empty |
//! | `KEY_CACHE_TTL_SECS` | Cipher key cache TTL | `1800` |
//! | `DEFAULT_KEY_TTL_SECS` | TTL of the cached fallback secret | `300` |
//! | `KEY_CACHE_CAPACITY` | Max callers held in the key cache | `1024` |
//! | `HTTP_TIMEOUT_SECS` | Outbound request timeout | `600` |
//! | `HTTP_MAX_RETRIES` | Transport retries on transient failures | `2` |
//! | `HTTP_RETRY_BASE_MS` | Backoff base delay | `500` |
//! | `AUDIT_LOG_ENABLED` | Global audit switch | `true` |
//! | `AUDIT_LOG_OPERATIONS` | Comma separated allow-list, empty = all | empty |
//! | `SEED_DESCRIPTORS_FILE` | JSON array of descriptors seeded at startup | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::OperationKind;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the database directory.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const CLAIMS_API_BASE_URL_ENV: &str = "CLAIMS_API_BASE_URL";
pub const CLAIMS_AUTH_URL_ENV: &str = "CLAIMS_AUTH_URL";
pub const SOFTWARE_CERTIFICATE_ID_ENV: &str = "SOFTWARE_CERTIFICATE_ID";
pub const DEFAULT_CIPHER_KEY_ENV: &str = "DEFAULT_CIPHER_KEY";
pub const KEY_CACHE_TTL_SECS_ENV: &str = "KEY_CACHE_TTL_SECS";
pub const DEFAULT_KEY_TTL_SECS_ENV: &str = "DEFAULT_KEY_TTL_SECS";
pub const KEY_CACHE_CAPACITY_ENV: &str = "KEY_CACHE_CAPACITY";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "HTTP_TIMEOUT_SECS";
pub const HTTP_MAX_RETRIES_ENV: &str = "HTTP_MAX_RETRIES";
pub const HTTP_RETRY_BASE_MS_ENV: &str = "HTTP_RETRY_BASE_MS";
pub const AUDIT_LOG_ENABLED_ENV: &str = "AUDIT_LOG_ENABLED";
pub const AUDIT_LOG_OPERATIONS_ENV: &str = "AUDIT_LOG_OPERATIONS";
pub const SEED_DESCRIPTORS_FILE_ENV: &str = "SEED_DESCRIPTORS_FILE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_DATA_DIR: &str = "/data";
const DATABASE_FILE: &str = "gateway.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration missing: {0}")]
    Missing(&'static str),

    #[error("configuration value for {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Key/value configuration provider with typed getters and defaults.
///
/// Values come from the process environment in production and from an
/// explicit map in tests. Blank values count as unset.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    /// Boolean setting. Accepts `1/true/yes/on` and `0/false/no/off`;
    /// anything else yields the default.
    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.optional(name) {
            Some(v) if matches_ignore_ascii(&v, &["1", "true", "yes", "on"]) => true,
            Some(v) if matches_ignore_ascii(&v, &["0", "false", "no", "off"]) => false,
            _ => default,
        }
    }

    pub fn int(&self, name: &str, default: u64) -> u64 {
        self.optional(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

fn matches_ignore_ascii(value: &str, expected: &[&str]) -> bool {
    expected.iter().any(|pat| value.eq_ignore_ascii_case(pat))
}

/// Which operation kinds get an audit record.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    pub enabled: bool,
    /// Empty means every kind is logged.
    pub allow_list: HashSet<OperationKind>,
}

impl AuditPolicy {
    pub fn all() -> Self {
        Self {
            enabled: true,
            allow_list: HashSet::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            allow_list: HashSet::new(),
        }
    }

    pub fn only(kinds: impl IntoIterator<Item = OperationKind>) -> Self {
        Self {
            enabled: true,
            allow_list: kinds.into_iter().collect(),
        }
    }

    pub fn is_logged(&self, kind: OperationKind) -> bool {
        self.enabled && (self.allow_list.is_empty() || self.allow_list.contains(&kind))
    }
}

#[derive(Debug, Clone)]
pub struct KeyCacheConfig {
    pub ttl: Duration,
    pub default_ttl: Duration,
    pub capacity: usize,
    pub default_secret: String,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            default_ttl: Duration::from_secs(5 * 60),
            capacity: 1024,
            default_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub api_base_url: String,
    pub auth_url: String,
    pub software_certificate_id: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl TransportConfig {
    /// Transport pointed at `base_url` with the default timeout and retry
    /// policy.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let api_base_url = base_url.into();
        Self {
            auth_url: default_auth_url(&api_base_url),
            api_base_url,
            software_certificate_id: String::new(),
            timeout: Duration::from_secs(600),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

fn default_auth_url(base_url: &str) -> String {
    format!("{}/auth/token", base_url.trim_end_matches('/'))
}

/// Typed configuration for the whole gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub transport: TransportConfig,
    pub key_cache: KeyCacheConfig,
    pub audit: AuditPolicy,
    pub seed_descriptors_file: Option<PathBuf>,
    pub log_json: bool,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_settings(&Settings::from_env())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let api_base_url = settings
            .optional(CLAIMS_API_BASE_URL_ENV)
            .ok_or(ConfigError::Missing(CLAIMS_API_BASE_URL_ENV))?;
        url::Url::parse(&api_base_url).map_err(|e| ConfigError::Invalid {
            name: CLAIMS_API_BASE_URL_ENV,
            reason: e.to_string(),
        })?;
        let auth_url = settings.string(CLAIMS_AUTH_URL_ENV, &default_auth_url(&api_base_url));

        let port = settings.int(PORT_ENV, 8080);
        let port = u16::try_from(port).map_err(|_| ConfigError::Invalid {
            name: PORT_ENV,
            reason: format!("{port} is not a valid port"),
        })?;

        let audit = AuditPolicy {
            enabled: settings.bool(AUDIT_LOG_ENABLED_ENV, true),
            allow_list: parse_allow_list(&settings.string(AUDIT_LOG_OPERATIONS_ENV, ""))?,
        };

        Ok(Self {
            host: settings.string(HOST_ENV, "0.0.0.0"),
            port,
            data_dir: PathBuf::from(settings.string(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            transport: TransportConfig {
                api_base_url,
                auth_url,
                software_certificate_id: settings.string(SOFTWARE_CERTIFICATE_ID_ENV, ""),
                timeout: Duration::from_secs(settings.int(HTTP_TIMEOUT_SECS_ENV, 600)),
                max_retries: settings.int(HTTP_MAX_RETRIES_ENV, 2).min(10) as u32,
                retry_base_delay: Duration::from_millis(settings.int(HTTP_RETRY_BASE_MS_ENV, 500)),
            },
            key_cache: KeyCacheConfig {
                ttl: Duration::from_secs(settings.int(KEY_CACHE_TTL_SECS_ENV, 30 * 60)),
                default_ttl: Duration::from_secs(settings.int(DEFAULT_KEY_TTL_SECS_ENV, 5 * 60)),
                capacity: settings.int(KEY_CACHE_CAPACITY_ENV, 1024) as usize,
                default_secret: settings.string(DEFAULT_CIPHER_KEY_ENV, ""),
            },
            audit,
            seed_descriptors_file: settings.optional(SEED_DESCRIPTORS_FILE_ENV).map(PathBuf::from),
            log_json: settings.string(LOG_FORMAT_ENV, "pretty").eq_ignore_ascii_case("json"),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse_allow_list(raw: &str) -> Result<HashSet<OperationKind>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            OperationKind::from_wire_name(name).ok_or_else(|| ConfigError::Invalid {
                name: AUDIT_LOG_OPERATIONS_ENV,
                reason: format!("unknown operation '{name}'"),
            })
        })
        .collect()
}
