// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for encrypted blobs and the token registry | `data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `FRONTEND_URL` | Base URL of the access page encoded in QR codes | `http://localhost:5173` |
//! | `TOKEN_TTL_SECS` | Token lifetime in seconds, `0` for no expiry | `3600` |
//! | `MAX_UPLOAD_BYTES` | Request body limit for uploads | `52428800` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
pub const TOKEN_TTL_ENV: &str = "TOKEN_TTL_SECS";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Settings resolved at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub frontend_url: Url,
    /// `None` when tokens should never expire.
    pub token_ttl: Option<Duration>,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary lookup (used by tests).
    ///
    /// Unset and empty variables take their default; set but malformed ones
    /// are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let host = match get(HOST_ENV) {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(HOST_ENV, &v, e))?,
            None => DEFAULT_HOST
                .parse()
                .map_err(|e| ConfigError::invalid(HOST_ENV, DEFAULT_HOST, e))?,
        };

        let port = match get(PORT_ENV) {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(PORT_ENV, &v, e))?,
            None => DEFAULT_PORT,
        };

        let data_dir = get(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DATA_ROOT));

        let raw_url = get(FRONTEND_URL_ENV).unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let frontend_url =
            Url::parse(raw_url.trim()).map_err(|e| ConfigError::invalid(FRONTEND_URL_ENV, &raw_url, e))?;
        if !matches!(frontend_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                FRONTEND_URL_ENV,
                &raw_url,
                "scheme must be http or https",
            ));
        }

        let ttl_secs: u64 = match get(TOKEN_TTL_ENV) {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(TOKEN_TTL_ENV, &v, e))?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };
        let token_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let max_upload_bytes = match get(MAX_UPLOAD_BYTES_ENV) {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(MAX_UPLOAD_BYTES_ENV, &v, e))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            None => LogFormat::Pretty,
            Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::invalid(
                    LOG_FORMAT_ENV,
                    v,
                    "expected `json` or `pretty`",
                ))
            }
        };

        Ok(Self {
            host,
            port,
            data_dir,
            frontend_url,
            token_ttl,
            max_upload_bytes,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
