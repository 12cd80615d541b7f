// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the HTTP API. All types derive `ToSchema`
//! (or `IntoParams`) for OpenAPI documentation.
//!
//! Request fields are optional so that a missing field is reported as a
//! `400` with a specific message instead of a generic deserialization error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::workflow::UploadReceipt;

// =============================================================================
// Upload Models
// =============================================================================

/// Multipart form accepted by `POST /upload` (documentation only).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The file to encrypt.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Password the recipient will need.
    pub password: String,
}

/// Result of an upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UploadResponse {
    pub message: String,
    /// Name the file will be delivered under.
    pub file_name: String,
    /// Hex SHA-256 of the uploaded plaintext.
    pub checksum: String,
    /// Access token (also embedded in `access_url`).
    pub token: String,
    /// URL to render as a QR code for the recipient.
    pub access_url: String,
    /// When the token stops working, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            message: "File uploaded successfully".to_string(),
            file_name: receipt.file_name,
            checksum: receipt.checksum.to_hex(),
            token: receipt.token.to_string(),
            access_url: receipt.access_url.to_string(),
            expires_at: receipt.expires_at,
        }
    }
}

// =============================================================================
// Redemption Models
// =============================================================================

/// Request to check whether a token is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VerifyTokenRequest {
    pub token: Option<String>,
}

/// Token validity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request to decrypt and download a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Query for `GET /params`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ParamsQuery {
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Token + password pre-check result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ParamsResponse {
    pub valid: bool,
    /// Hex SHA-256 of the decrypted content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Request for a one-shot download grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeDownloadRequest {
    pub token: Option<String>,
    pub password: Option<String>,
    /// Checksum the recipient received from the uploader.
    pub checksum: Option<String>,
}

/// A grant usable once at `GET /access/download/{grant}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AuthorizeDownloadResponse {
    pub download_grant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
