// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secure QR Drop - password-encrypted file drop
//!
//! Uploaded files are encrypted at rest under a key derived from the
//! uploader's password. Each upload gets a random access token with an
//! optional expiry; the client renders the returned access URL as a QR code.
//! Recipients redeem the token with the password and confirm the SHA-256
//! checksum of what they receive.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment configuration
//! - `crypto` - Checksums and the file cipher
//! - `storage` - Encrypted file layout and the token registry
//! - `workflow` - Upload and redemption logic independent of HTTP

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod workflow;
