// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access Workflow
//!
//! Orchestrates the two halves of a file drop.
//!
//! ## Upload
//!
//! ```text
//! Uploaded -> Checksummed -> Encrypted -> TokenIssued
//! ```
//!
//! The plaintext is checksummed, encrypted under `SHA-256(password)`, written
//! as a blob, and a token scoped to that blob is issued. The caller gets the
//! token, the checksum and the access URL to encode as a QR code.
//!
//! ## Redemption
//!
//! ```text
//! TokenPresented -> Validated -> PasswordChecked -> ChecksumConfirmed -> Delivered
//! ```
//!
//! Every failure (`InvalidToken`, `WrongPassword`, `ChecksumMismatch`,
//! `DecryptionFailed`) is terminal for the request. Nothing is retried and
//! nothing is consumed, so the caller may start over with corrected input.
//!
//! [`AccessWorkflow::authorize_download`] and [`AccessWorkflow::take_download`]
//! split redemption in two: the recipient proves the password and the checksum
//! first, then fetches the bytes exactly once with the returned grant. A token
//! holds at most one grant, and a grant lapses after [`GRANT_TTL`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use url::Url;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::crypto::{
    checksum_reader, decrypt, decrypt_exact, derive_key, encrypt, Checksum, CipherError,
    EncryptedPayload,
};
use crate::storage::paths::sanitize_file_name;
use crate::storage::registry::log_prefix;
use crate::storage::{
    ContentInfo, EncryptedStorage, StorageError, Token, TokenRecord, TokenRegistry,
};

/// How long a download grant stays redeemable.
pub const GRANT_TTL: Duration = Duration::from_secs(300);

// =============================================================================
// Errors
// =============================================================================

/// Coarse error category, used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing file or password; rejected before any state change.
    Input,
    /// Invalid/expired token or wrong password; safe to retry with new input.
    Auth,
    /// Decrypted content does not match the expected checksum.
    Integrity,
    /// Decryption or I/O failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Missing {0}")]
    MissingInput(&'static str),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("Checksum mismatch, possible tampering")]
    ChecksumMismatch,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(#[from] CipherError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::MissingInput(_) => ErrorKind::Input,
            WorkflowError::InvalidToken | WorkflowError::WrongPassword => ErrorKind::Auth,
            WorkflowError::ChecksumMismatch => ErrorKind::Integrity,
            WorkflowError::DecryptionFailed(_) | WorkflowError::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// A file as received from the upload transport.
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub token: Token,
    pub checksum: Checksum,
    pub file_name: String,
    pub access_url: Url,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a password + token pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamsCheck {
    pub valid: bool,
    pub checksum: Option<Checksum>,
}

impl ParamsCheck {
    fn invalid() -> Self {
        Self {
            valid: false,
            checksum: None,
        }
    }
}

/// One-shot permission to fetch a decrypted file.
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    pub id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decrypted content ready for the delivery sink.
pub struct Delivery {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub checksum: Checksum,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .field("checksum", &self.checksum)
            .finish()
    }
}

/// Tunables supplied from configuration.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Lifetime of issued tokens. `None` issues tokens that never expire.
    pub token_ttl: Option<Duration>,
    /// Frontend base URL; the access URL is `{base}/access?token=...`.
    pub access_base_url: Url,
}

// =============================================================================
// Workflow
// =============================================================================

struct PendingGrant {
    token: Token,
    deadline: Instant,
}

pub struct AccessWorkflow {
    storage: EncryptedStorage,
    registry: Arc<TokenRegistry>,
    settings: WorkflowSettings,
    grants: Mutex<HashMap<String, PendingGrant>>,
}

impl AccessWorkflow {
    pub fn new(
        storage: EncryptedStorage,
        registry: Arc<TokenRegistry>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            storage,
            registry,
            settings,
            grants: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &EncryptedStorage {
        &self.storage
    }

    /// Encrypt an uploaded file and issue a token for it.
    pub fn upload(
        &self,
        file: Option<UploadedFile>,
        password: Option<&str>,
    ) -> WorkflowResult<UploadReceipt> {
        let mut file = file.ok_or(WorkflowError::MissingInput("file"))?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or(WorkflowError::MissingInput("password"))?;
        let file_name =
            sanitize_file_name(&file.name).ok_or(WorkflowError::MissingInput("file name"))?;

        let size = file.bytes.len();
        let content = ContentInfo {
            checksum: content_checksum(&file.bytes)?,
            len: size as u64,
        };
        let payload = encrypt(&file.bytes, &derive_key(password));
        file.bytes.zeroize();

        let upload_id = Uuid::new_v4().to_string();
        let blob_path = self.storage.paths().encrypted_file(&upload_id, &file_name);
        self.storage.write_raw(&blob_path, &payload.to_bytes())?;

        let issued = self
            .registry
            .issue(blob_path, password, Some(content), self.settings.token_ttl);
        let (token, record) = match issued {
            Ok(issued) => issued,
            Err(e) => {
                let upload_dir = self.storage.paths().upload_dir(&upload_id);
                if let Err(cleanup) = self.storage.remove_dir(&upload_dir) {
                    tracing::warn!(
                        upload_id = %upload_id,
                        error = %cleanup,
                        "Failed to remove upload after token issue failed"
                    );
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            token = token.log_prefix(),
            upload_id = %upload_id,
            size,
            "File encrypted and token issued"
        );

        Ok(UploadReceipt {
            access_url: access_url(&self.settings.access_base_url, &token),
            expires_at: record.expires_at(),
            token,
            checksum: content.checksum,
            file_name,
        })
    }

    /// Whether the token currently unlocks anything.
    pub fn redeem_check(&self, token: &str) -> bool {
        self.registry.validate(token).is_some()
    }

    /// Check token and password, and report the checksum of the decrypted
    /// content so the recipient can compare it before downloading.
    pub fn params_check(&self, token: &str, password: &str) -> WorkflowResult<ParamsCheck> {
        let Some(record) = self.registry.validate(token) else {
            return Ok(ParamsCheck::invalid());
        };
        if !passwords_match(&record.password, password) {
            return Ok(ParamsCheck::invalid());
        }

        let plaintext = self.decrypt_record(&record, password)?;
        Ok(ParamsCheck {
            valid: true,
            checksum: Some(content_checksum(&plaintext)?),
        })
    }

    /// Decrypt with the presented password and deliver if the result matches
    /// what was uploaded.
    ///
    /// The key comes from the presented password, so a wrong password shows
    /// up as [`WorkflowError::ChecksumMismatch`]. Records written without a
    /// checksum fall back to comparing the password.
    pub fn redeem_download(&self, token: &str, password: &str) -> WorkflowResult<Delivery> {
        let record = self
            .registry
            .validate(token)
            .ok_or(WorkflowError::InvalidToken)?;

        let plaintext = self.decrypt_record(&record, password)?;
        let actual = content_checksum(&plaintext)?;

        if let Some(expected) = record.checksum {
            if actual != expected {
                tracing::warn!(token = log_prefix(token), "Checksum mismatch on redemption");
                return Err(WorkflowError::ChecksumMismatch);
            }
        }
        if !passwords_match(&record.password, password) {
            return Err(WorkflowError::WrongPassword);
        }

        tracing::info!(token = log_prefix(token), "File delivered");
        Ok(Delivery {
            file_name: record.original_file_name(),
            bytes: plaintext,
            checksum: actual,
        })
    }

    /// Verify password and the checksum the recipient presents, then mint a
    /// grant for exactly one download.
    pub fn authorize_download(
        &self,
        token: &str,
        password: &str,
        presented_checksum: &str,
    ) -> WorkflowResult<DownloadGrant> {
        if presented_checksum.trim().is_empty() {
            return Err(WorkflowError::MissingInput("checksum"));
        }
        let record = self
            .registry
            .validate(token)
            .ok_or(WorkflowError::InvalidToken)?;
        if !passwords_match(&record.password, password) {
            return Err(WorkflowError::WrongPassword);
        }

        let plaintext = self.decrypt_record(&record, password)?;
        let actual = content_checksum(&plaintext)?;
        let presented: Option<Checksum> = presented_checksum.parse().ok();
        let recorded_ok = record.checksum.map_or(true, |expected| expected == actual);
        if presented != Some(actual) || !recorded_ok {
            tracing::warn!(token = log_prefix(token), "Checksum mismatch on authorization");
            return Err(WorkflowError::ChecksumMismatch);
        }

        let id = random_hex(16);
        let now = Instant::now();
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        // A new grant replaces any earlier one for the same token.
        grants.retain(|_, pending| {
            pending.deadline > now
                && pending.token.as_str() != token
                && self.registry.validate(pending.token.as_str()).is_some()
        });
        grants.insert(
            id.clone(),
            PendingGrant {
                token: Token::from(token),
                deadline: now + GRANT_TTL,
            },
        );

        let grant_deadline = chrono::Duration::from_std(GRANT_TTL)
            .ok()
            .map(|ttl| Utc::now() + ttl);
        tracing::info!(token = log_prefix(token), "Download authorized");
        Ok(DownloadGrant {
            id,
            expires_at: [record.expires_at(), grant_deadline].into_iter().flatten().min(),
        })
    }

    /// Redeem a grant from [`Self::authorize_download`]. Works once, and
    /// only before the grant lapses.
    pub fn take_download(&self, grant_id: &str) -> WorkflowResult<Delivery> {
        let PendingGrant { token, deadline } = self
            .grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(grant_id)
            .ok_or(WorkflowError::InvalidToken)?;
        if deadline <= Instant::now() {
            return Err(WorkflowError::InvalidToken);
        }

        let record = self
            .registry
            .validate(token.as_str())
            .ok_or(WorkflowError::InvalidToken)?;

        let plaintext = self.decrypt_record(&record, &record.password)?;
        tracing::info!(token = token.log_prefix(), "File delivered via grant");
        Ok(Delivery {
            file_name: record.original_file_name(),
            checksum: content_checksum(&plaintext)?,
            bytes: plaintext,
        })
    }

    fn decrypt_record(&self, record: &TokenRecord, password: &str) -> WorkflowResult<Vec<u8>> {
        let blob = self.storage.read_raw(&record.file_ref)?;
        let payload = EncryptedPayload::from_bytes(&blob)?;
        let key = derive_key(password);
        let plaintext = match record.plaintext_len {
            Some(len) => decrypt_exact(
                &payload.iv,
                &payload.ciphertext,
                &key,
                usize::try_from(len).unwrap_or(usize::MAX),
            )?,
            // Legacy records: the length is unknown, strip the zero padding.
            None => decrypt(&payload.iv, &payload.ciphertext, &key)?,
        };
        Ok(plaintext)
    }

    #[cfg(test)]
    fn pending_grants(&self) -> usize {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for AccessWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessWorkflow")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Checksum of plaintext held in memory, read through in bounded chunks.
fn content_checksum(content: &[u8]) -> WorkflowResult<Checksum> {
    checksum_reader(content).map_err(|e| WorkflowError::Storage(e.into()))
}

/// Constant-time equality for the stored and presented password.
fn passwords_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build `{base}/access?token={token}`.
pub fn access_url(base: &Url, token: &Token) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("access");
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("token", token.as_str());
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{checksum, IV_SIZE};
    use crate::storage::StoragePaths;

    struct Fixture {
        _dir: tempfile::TempDir,
        workflow: AccessWorkflow,
    }

    fn fixture_with_ttl(token_ttl: Option<Duration>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("init storage");
        let registry = Arc::new(TokenRegistry::open(storage.clone()).expect("open registry"));
        let settings = WorkflowSettings {
            token_ttl,
            access_base_url: Url::parse("https://drop.example.com").unwrap(),
        };
        Fixture {
            _dir: dir,
            workflow: AccessWorkflow::new(storage, registry, settings),
        }
    }

    fn fixture() -> Fixture {
        fixture_with_ttl(Some(Duration::from_secs(3600)))
    }

    fn report() -> Vec<u8> {
        // 1000 bytes that never end in the zero pad byte.
        (0..1000).map(|i| (i % 250) as u8 + 1).collect()
    }

    fn upload(workflow: &AccessWorkflow, name: &str, bytes: Vec<u8>, password: &str) -> UploadReceipt {
        workflow
            .upload(
                Some(UploadedFile {
                    name: name.to_string(),
                    bytes,
                }),
                Some(password),
            )
            .expect("upload succeeds")
    }

    #[test]
    fn upload_then_redeem_with_correct_password() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");

        assert_eq!(receipt.file_name, "report.pdf");
        assert_eq!(receipt.checksum, checksum(&report()));
        assert!(receipt.expires_at.is_some());

        let delivery = f
            .workflow
            .redeem_download(receipt.token.as_str(), "hunter2")
            .expect("redeem succeeds");
        assert_eq!(delivery.bytes, report());
        assert_eq!(delivery.file_name, "report.pdf");
        assert_eq!(checksum(&delivery.bytes), receipt.checksum);
    }

    #[test]
    fn wrong_password_is_checksum_mismatch() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");

        let result = f.workflow.redeem_download(receipt.token.as_str(), "wrong");
        let err = result.expect_err("no bytes delivered");
        assert!(matches!(err, WorkflowError::ChecksumMismatch));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn blob_is_iv_plus_padded_ciphertext() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let record = f.workflow.registry().validate(receipt.token.as_str()).unwrap();

        let blob = std::fs::read(&record.file_ref).unwrap();
        assert_eq!(blob.len(), IV_SIZE + 1008);
        assert!(record.file_ref.to_string_lossy().ends_with("report.pdf.enc"));
        // The plaintext never lands on disk.
        let original = report();
        let head = &original[..32];
        assert!(!blob.windows(32).any(|w| w == head));
    }

    #[test]
    fn missing_inputs_are_rejected() {
        let f = fixture();
        let file = || {
            Some(UploadedFile {
                name: "a.txt".to_string(),
                bytes: b"x".to_vec(),
            })
        };

        let err = f.workflow.upload(None, Some("pw")).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingInput("file")));
        assert_eq!(err.kind(), ErrorKind::Input);

        assert!(matches!(
            f.workflow.upload(file(), None),
            Err(WorkflowError::MissingInput("password"))
        ));
        assert!(matches!(
            f.workflow.upload(file(), Some("")),
            Err(WorkflowError::MissingInput("password"))
        ));
        assert!(matches!(
            f.workflow.upload(
                Some(UploadedFile {
                    name: "../".to_string(),
                    bytes: b"x".to_vec()
                }),
                Some("pw")
            ),
            Err(WorkflowError::MissingInput("file name"))
        ));
        assert!(f.workflow.registry().is_empty());
    }

    #[test]
    fn same_name_uploads_do_not_collide() {
        let f = fixture();
        let first = upload(&f.workflow, "notes.txt", b"first".to_vec(), "a");
        let second = upload(&f.workflow, "notes.txt", b"second".to_vec(), "b");

        let one = f.workflow.redeem_download(first.token.as_str(), "a").unwrap();
        let two = f.workflow.redeem_download(second.token.as_str(), "b").unwrap();
        assert_eq!(one.bytes, b"first");
        assert_eq!(two.bytes, b"second");
    }

    #[test]
    fn unknown_token_is_invalid() {
        let f = fixture();
        assert!(!f.workflow.redeem_check("nope"));
        let err = f.workflow.redeem_download("nope", "pw").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidToken));
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn expired_token_rejected_while_blob_remains() {
        let f = fixture_with_ttl(Some(Duration::ZERO));
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");

        assert!(!f.workflow.redeem_check(receipt.token.as_str()));
        assert!(matches!(
            f.workflow.redeem_download(receipt.token.as_str(), "hunter2"),
            Err(WorkflowError::InvalidToken)
        ));

        let blobs = std::fs::read_dir(f.workflow.storage().paths().uploads_dir())
            .unwrap()
            .count();
        assert_eq!(blobs, 1);
    }

    #[test]
    fn tokens_without_ttl_do_not_expire() {
        let f = fixture_with_ttl(None);
        let receipt = upload(&f.workflow, "a.txt", b"abc".to_vec(), "pw");
        assert!(receipt.expires_at.is_none());
        assert!(f.workflow.redeem_check(receipt.token.as_str()));
    }

    #[test]
    fn params_check_reports_checksum() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");

        let ok = f
            .workflow
            .params_check(receipt.token.as_str(), "hunter2")
            .unwrap();
        assert_eq!(
            ok,
            ParamsCheck {
                valid: true,
                checksum: Some(receipt.checksum)
            }
        );

        let bad = f.workflow.params_check(receipt.token.as_str(), "nope").unwrap();
        assert!(!bad.valid);
        assert!(bad.checksum.is_none());

        assert!(!f.workflow.params_check("missing", "hunter2").unwrap().valid);
    }

    #[test]
    fn grant_works_exactly_once() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");

        let grant = f
            .workflow
            .authorize_download(
                receipt.token.as_str(),
                "hunter2",
                &receipt.checksum.to_hex().to_uppercase(),
            )
            .expect("authorized");

        let delivery = f.workflow.take_download(&grant.id).expect("first download");
        assert_eq!(delivery.bytes, report());

        assert!(matches!(
            f.workflow.take_download(&grant.id),
            Err(WorkflowError::InvalidToken)
        ));
    }

    #[test]
    fn authorize_rejects_bad_password_and_checksum() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let token = receipt.token.as_str();
        let good = receipt.checksum.to_hex();

        assert!(matches!(
            f.workflow.authorize_download(token, "wrong", &good),
            Err(WorkflowError::WrongPassword)
        ));
        assert!(matches!(
            f.workflow.authorize_download(token, "hunter2", &checksum(b"other").to_hex()),
            Err(WorkflowError::ChecksumMismatch)
        ));
        assert!(matches!(
            f.workflow.authorize_download(token, "hunter2", "not-a-checksum"),
            Err(WorkflowError::ChecksumMismatch)
        ));
        assert!(matches!(
            f.workflow.authorize_download(token, "hunter2", "  "),
            Err(WorkflowError::MissingInput("checksum"))
        ));
        assert!(matches!(
            f.workflow.authorize_download("missing", "hunter2", &good),
            Err(WorkflowError::InvalidToken)
        ));
    }

    #[test]
    fn tampered_blob_is_detected() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let record = f.workflow.registry().validate(receipt.token.as_str()).unwrap();

        let mut blob = std::fs::read(&record.file_ref).unwrap();
        blob[IV_SIZE + 40] ^= 0x01;
        std::fs::write(&record.file_ref, blob).unwrap();

        assert!(matches!(
            f.workflow.redeem_download(receipt.token.as_str(), "hunter2"),
            Err(WorkflowError::ChecksumMismatch)
        ));
    }

    #[test]
    fn truncated_blob_is_decryption_failure() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let record = f.workflow.registry().validate(receipt.token.as_str()).unwrap();
        std::fs::write(&record.file_ref, [0u8; IV_SIZE + 5]).unwrap();

        let err = f
            .workflow
            .redeem_download(receipt.token.as_str(), "hunter2")
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::DecryptionFailed(CipherError::Misaligned(5))
        ));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn missing_blob_is_storage_failure() {
        let f = fixture();
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let record = f.workflow.registry().validate(receipt.token.as_str()).unwrap();
        std::fs::remove_file(&record.file_ref).unwrap();

        assert!(matches!(
            f.workflow.redeem_download(receipt.token.as_str(), "hunter2"),
            Err(WorkflowError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn legacy_record_falls_back_to_password_check() {
        let f = fixture();
        let storage = f.workflow.storage();
        let blob_path = storage.paths().uploads_dir().join("legacy.txt.enc");
        let payload = encrypt(b"legacy content", &derive_key("pw"));
        storage.write_raw(&blob_path, &payload.to_bytes()).unwrap();

        let (token, _) = f
            .workflow
            .registry()
            .issue(blob_path, "pw", None, None)
            .unwrap();

        let delivery = f.workflow.redeem_download(token.as_str(), "pw").unwrap();
        assert_eq!(delivery.bytes, b"legacy content");
        assert_eq!(delivery.file_name, "legacy.txt");

        assert!(matches!(
            f.workflow.redeem_download(token.as_str(), "other"),
            Err(WorkflowError::WrongPassword)
        ));
    }

    #[test]
    fn content_ending_in_zero_bytes_round_trips() {
        let f = fixture();
        // End-of-central-directory record with an empty comment, as in every zip.
        let mut archive = b"PK\x05\x06".to_vec();
        archive.extend_from_slice(&[1u8; 16]);
        archive.extend_from_slice(&[0, 0]);
        let receipt = upload(&f.workflow, "bundle.zip", archive.clone(), "hunter2");
        let token = receipt.token.as_str();

        let delivery = f.workflow.redeem_download(token, "hunter2").unwrap();
        assert_eq!(delivery.bytes, archive);
        assert_eq!(delivery.checksum, receipt.checksum);

        let params = f.workflow.params_check(token, "hunter2").unwrap();
        assert_eq!(params.checksum, Some(receipt.checksum));

        let grant = f
            .workflow
            .authorize_download(token, "hunter2", &receipt.checksum.to_hex())
            .unwrap();
        assert_eq!(f.workflow.take_download(&grant.id).unwrap().bytes, archive);

        assert!(matches!(
            f.workflow.redeem_download(token, "wrong"),
            Err(WorkflowError::ChecksumMismatch)
        ));
    }

    #[test]
    fn all_zero_and_empty_files_round_trip() {
        let f = fixture();
        for bytes in [vec![0u8; 16], Vec::new()] {
            let receipt = upload(&f.workflow, "zeros.bin", bytes.clone(), "pw");
            let delivery = f
                .workflow
                .redeem_download(receipt.token.as_str(), "pw")
                .unwrap();
            assert_eq!(delivery.bytes, bytes);
        }
    }

    #[test]
    fn reauthorizing_replaces_the_previous_grant() {
        let f = fixture_with_ttl(None);
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let token = receipt.token.as_str();
        let sum = receipt.checksum.to_hex();

        let first = f.workflow.authorize_download(token, "hunter2", &sum).unwrap();
        let last = (0..50)
            .map(|_| f.workflow.authorize_download(token, "hunter2", &sum).unwrap())
            .last()
            .unwrap();
        assert_eq!(f.workflow.pending_grants(), 1);
        assert!(last.expires_at.is_some());

        assert!(matches!(
            f.workflow.take_download(&first.id),
            Err(WorkflowError::InvalidToken)
        ));
        assert_eq!(f.workflow.take_download(&last.id).unwrap().bytes, report());
        assert_eq!(f.workflow.pending_grants(), 0);
    }

    #[test]
    fn grants_for_different_tokens_coexist() {
        let f = fixture();
        let a = upload(&f.workflow, "a.txt", b"aaa".to_vec(), "pw");
        let b = upload(&f.workflow, "b.txt", b"bbb".to_vec(), "pw");

        let grant_a = f
            .workflow
            .authorize_download(a.token.as_str(), "pw", &a.checksum.to_hex())
            .unwrap();
        let grant_b = f
            .workflow
            .authorize_download(b.token.as_str(), "pw", &b.checksum.to_hex())
            .unwrap();
        assert_eq!(f.workflow.pending_grants(), 2);

        assert_eq!(f.workflow.take_download(&grant_a.id).unwrap().bytes, b"aaa");
        assert_eq!(f.workflow.take_download(&grant_b.id).unwrap().bytes, b"bbb");
    }

    #[test]
    fn lapsed_grant_is_rejected() {
        let f = fixture_with_ttl(None);
        let receipt = upload(&f.workflow, "report.pdf", report(), "hunter2");
        let grant = f
            .workflow
            .authorize_download(receipt.token.as_str(), "hunter2", &receipt.checksum.to_hex())
            .unwrap();

        f.workflow
            .grants
            .lock()
            .unwrap()
            .get_mut(&grant.id)
            .unwrap()
            .deadline = Instant::now();

        assert!(matches!(
            f.workflow.take_download(&grant.id),
            Err(WorkflowError::InvalidToken)
        ));
        assert_eq!(f.workflow.pending_grants(), 0);
    }

    #[test]
    fn failed_token_issue_removes_the_blob() {
        let f = fixture();
        // A directory where the registry temp file goes makes persisting fail.
        let registry_file = f.workflow.storage().paths().registry_file();
        let mut temp_name = registry_file.file_name().unwrap().to_os_string();
        temp_name.push(".tmp");
        std::fs::create_dir_all(registry_file.with_file_name(temp_name)).unwrap();

        let err = f
            .workflow
            .upload(
                Some(UploadedFile {
                    name: "report.pdf".to_string(),
                    bytes: report(),
                }),
                Some("hunter2"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(f.workflow.registry().is_empty());

        let leftovers = std::fs::read_dir(f.workflow.storage().paths().uploads_dir())
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn access_url_appends_path_and_token() {
        let token = Token::from("abc123");
        let url = access_url(&Url::parse("https://app.example.com").unwrap(), &token);
        assert_eq!(url.as_str(), "https://app.example.com/access?token=abc123");

        let nested = access_url(&Url::parse("https://example.com/drop/").unwrap(), &token);
        assert_eq!(nested.as_str(), "https://example.com/drop/access?token=abc123");
    }

    #[test]
    fn password_comparison() {
        assert!(passwords_match("hunter2", "hunter2"));
        assert!(!passwords_match("hunter2", "hunter3"));
        assert!(!passwords_match("hunter2", "hunter22"));
        assert!(!passwords_match("hunter2", ""));
    }
}
