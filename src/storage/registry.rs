// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token registry backed by a single JSON file.
//!
//! The registry maps opaque access tokens to the encrypted blob they unlock.
//! It is the only shared mutable state in the service and the single source
//! of truth for token validity.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "3f1c...e9": {
//!     "file_name": "data/uploads/<id>/report.pdf.enc",
//!     "password": "hunter2",
//!     "expiry": 1767225600,
//!     "checksum": "ab12...",
//!     "plaintext_len": 1000
//!   }
//! }
//! ```
//!
//! `expiry` is a unix timestamp in seconds or `null`. `checksum` and
//! `plaintext_len` are absent in files written by earlier deployments. The whole file is rewritten on every
//! mutation through an atomic rename.
//!
//! ## Concurrency
//!
//! Writers hold the write lock across both the in-memory insert and the
//! file replace, so writes are serialized and a reader never observes a
//! record that failed to persist.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::paths::original_file_name;
use super::{EncryptedStorage, StorageResult};
use crate::crypto::Checksum;

/// Number of random bytes in a token (hex encoded to twice as many chars).
pub const TOKEN_BYTES: usize = 16;

/// Opaque, unguessable access token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Token(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to put in logs.
    pub fn log_prefix(&self) -> &str {
        log_prefix(&self.0)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_string())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}..)", self.log_prefix())
    }
}

pub(crate) fn log_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

/// Plaintext facts recorded at upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentInfo {
    pub checksum: Checksum,
    pub len: u64,
}

/// What a token unlocks.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRecord {
    /// Path of the encrypted blob.
    #[serde(rename = "file_name")]
    pub file_ref: PathBuf,
    /// Password required to derive the decryption key (stored as given).
    pub password: String,
    /// Unix timestamp (seconds) after which the token is dead, if any.
    pub expiry: Option<i64>,
    /// Plaintext checksum recorded at upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    /// Plaintext length in bytes, used to cut the padding off exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext_len: Option<u64>,
}

impl TokenRecord {
    /// Valid while there is no expiry or the expiry is strictly in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map_or(true, |exp| exp > now.timestamp())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Name to offer the recipient when delivering the file.
    pub fn original_file_name(&self) -> String {
        original_file_name(&self.file_ref).unwrap_or_else(|| "download".to_string())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("file_ref", &self.file_ref)
            .field("password", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("checksum", &self.checksum)
            .field("plaintext_len", &self.plaintext_len)
            .finish()
    }
}

/// Durable token → record map.
pub struct TokenRegistry {
    storage: EncryptedStorage,
    path: PathBuf,
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl TokenRegistry {
    /// Load the registry file from storage, or start empty if there is none.
    pub fn open(storage: EncryptedStorage) -> StorageResult<Self> {
        let path = storage.paths().registry_file();
        let records: HashMap<String, TokenRecord> = if storage.exists(&path) {
            storage.read_json(&path)?
        } else {
            HashMap::new()
        };

        tracing::info!(
            path = %path.display(),
            tokens = records.len(),
            "Token registry loaded"
        );

        Ok(Self {
            storage,
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Issue a token for an encrypted blob and persist it before returning.
    pub fn issue(
        &self,
        file_ref: PathBuf,
        password: &str,
        content: Option<ContentInfo>,
        ttl: Option<Duration>,
    ) -> StorageResult<(Token, TokenRecord)> {
        self.issue_at(file_ref, password, content, ttl, Utc::now())
    }

    /// [`Self::issue`] with an explicit issuance time.
    pub fn issue_at(
        &self,
        file_ref: PathBuf,
        password: &str,
        content: Option<ContentInfo>,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> StorageResult<(Token, TokenRecord)> {
        let expiry = ttl.map(|ttl| {
            let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
            now.timestamp().saturating_add(secs)
        });
        let record = TokenRecord {
            file_ref,
            password: password.to_string(),
            expiry,
            checksum: content.map(|c| c.checksum),
            plaintext_len: content.map(|c| c.len),
        };

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let mut token = Token::generate();
        while records.contains_key(token.as_str()) {
            token = Token::generate();
        }

        records.insert(token.0.clone(), record.clone());
        if let Err(e) = self.storage.write_json(&self.path, &*records) {
            records.remove(token.as_str());
            tracing::warn!(error = %e, "Failed to persist token registry, issue rolled back");
            return Err(e);
        }

        tracing::debug!(token = token.log_prefix(), expiry = ?expiry, "Token issued");
        Ok((token, record))
    }

    /// Return the record if the token exists and has not expired.
    ///
    /// Unknown and expired tokens both yield `None`.
    pub fn validate(&self, token: &str) -> Option<TokenRecord> {
        self.validate_at(token, Utc::now())
    }

    /// [`Self::validate`] against an explicit clock reading.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Option<TokenRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(token)
            .filter(|record| record.is_valid_at(now))
            .cloned()
    }

    /// Drop expired records and persist. Returns how many were removed.
    ///
    /// Blobs are left on disk; their retention is handled elsewhere.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        let snapshot = records.clone();
        records.retain(|_, record| record.is_valid_at(now));
        let removed = before - records.len();

        if removed > 0 {
            if let Err(e) = self.storage.write_json(&self.path, &*records) {
                *records = snapshot;
                return Err(e);
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("path", &self.path)
            .field("tokens", &self.len())
            .finish()
    }
}
