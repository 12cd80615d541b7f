// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for persistent storage.
pub const DATA_ROOT: &str = "data";

/// Registry file name, kept from earlier deployments so existing files load.
pub const REGISTRY_FILE: &str = "qr_tokens.json";

/// Suffix appended to the original file name for encrypted blobs.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persisted data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Upload Paths ==========

    /// Directory containing all encrypted uploads.
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Directory for a single upload. Keeps same-named uploads apart.
    pub fn upload_dir(&self, upload_id: &str) -> PathBuf {
        self.uploads_dir().join(upload_id)
    }

    /// Path to the encrypted blob for an upload.
    pub fn encrypted_file(&self, upload_id: &str, file_name: &str) -> PathBuf {
        self.upload_dir(upload_id)
            .join(format!("{file_name}{ENCRYPTED_SUFFIX}"))
    }

    // ========== Registry Paths ==========

    /// Path to the token registry file.
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }
}

/// Recover the name the file was uploaded under from its blob path.
pub fn original_file_name(blob_path: &Path) -> Option<String> {
    let name = blob_path.file_name()?.to_str()?;
    let original = name.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(name);
    if original.is_empty() {
        None
    } else {
        Some(original.to_string())
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, so `../../etc/passwd` becomes `passwd`.
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}
