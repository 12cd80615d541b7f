// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the service: encrypted upload blobs and the token
//! registry that gates access to them.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   qr_tokens.json              # Token registry (token -> record)
//!   uploads/{upload_id}/
//!     {file_name}.enc           # iv (16 bytes) || AES-256-CBC ciphertext
//! ```
//!
//! ## Important Notes
//!
//! - Blobs are encrypted by [`crate::crypto`] before they reach this module
//! - The registry stores passwords in cleartext; protect `$DATA_DIR`
//! - Blobs are never deleted by the service

pub mod encrypted_fs;
pub mod paths;
pub mod registry;

pub use encrypted_fs::{EncryptedStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use registry::{ContentInfo, Token, TokenRecord, TokenRegistry};
