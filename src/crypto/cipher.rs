// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password-keyed AES-256-CBC encryption of file payloads.
//!
//! ## Blob Layout
//!
//! ```text
//! +-----------+---------------------------------------+
//! | IV (16 B) | AES-256-CBC(plaintext || 0x00 * pad) |
//! +-----------+---------------------------------------+
//! ```
//!
//! `pad` is `16 - len % 16`, so between 1 and 16 zero bytes are always
//! appended. The layout is kept for compatibility with blobs written by
//! earlier deployments.
//!
//! When the plaintext length is known, [`decrypt_exact`] cuts the padding
//! off by length and is lossless. [`decrypt`] strips every trailing zero
//! byte instead, so a plaintext that itself ends in `0x00` comes back
//! shorter.
//!
//! There is no authentication tag: a wrong key decrypts to garbage instead
//! of failing. Callers confirm the result with [`super::checksum`].

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// CBC initialization vector size in bytes.
pub const IV_SIZE: usize = 16;

/// Derived key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

const PAD_BYTE: u8 = 0x00;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encrypted blob is {0} bytes, shorter than the {IV_SIZE}-byte IV")]
    Truncated(usize),

    #[error("ciphertext length {0} is not a positive multiple of {BLOCK_SIZE}")]
    Misaligned(usize),

    #[error("plaintext length {expected} does not fit a {padded}-byte padded payload")]
    LengthMismatch { expected: usize, padded: usize },
}

/// A 256-bit key derived from a password. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PasswordKey([u8; KEY_SIZE]);

impl PasswordKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for PasswordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordKey").field(&"[REDACTED]").finish()
    }
}

/// Derive the file key as `SHA-256(password)`.
///
/// Unsalted and fast. The same password always yields the same key.
pub fn derive_key(password: &str) -> PasswordKey {
    PasswordKey(Sha256::digest(password.as_bytes()).into())
}

/// Output of [`encrypt`]: a fresh IV and the padded ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Serialize as `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split a stored blob into IV and ciphertext.
    pub fn from_bytes(blob: &[u8]) -> Result<Self, CipherError> {
        if blob.len() < IV_SIZE {
            return Err(CipherError::Truncated(blob.len()));
        }
        let (iv, ciphertext) = blob.split_at(IV_SIZE);
        let mut iv_bytes = [0u8; IV_SIZE];
        iv_bytes.copy_from_slice(iv);
        Ok(Self {
            iv: iv_bytes,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

fn pad(plaintext: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(plaintext.len() + pad_len);
    padded.extend_from_slice(plaintext);
    padded.resize(plaintext.len() + pad_len, PAD_BYTE);
    padded
}

fn unpad(mut plaintext: Vec<u8>) -> Vec<u8> {
    let keep = plaintext
        .iter()
        .rposition(|&b| b != PAD_BYTE)
        .map_or(0, |i| i + 1);
    plaintext.truncate(keep);
    plaintext
}

/// Encrypt under a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &PasswordKey) -> EncryptedPayload {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut padded = pad(plaintext);
    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<NoPadding>(&padded);
    padded.zeroize();

    EncryptedPayload { iv, ciphertext }
}

/// Decrypt and strip trailing zero padding.
///
/// Only structural problems are errors. A wrong key returns `Ok` with
/// meaningless bytes.
pub fn decrypt(
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
    key: &PasswordKey,
) -> Result<Vec<u8>, CipherError> {
    decrypt_blocks(iv, ciphertext, key).map(unpad)
}

/// Decrypt and keep exactly `plaintext_len` bytes.
///
/// The padding must be 1..=16 bytes, as [`encrypt`] writes it; anything
/// else is a [`CipherError::LengthMismatch`].
pub fn decrypt_exact(
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
    key: &PasswordKey,
    plaintext_len: usize,
) -> Result<Vec<u8>, CipherError> {
    let mut plaintext = decrypt_blocks(iv, ciphertext, key)?;
    let padded = plaintext.len();
    if plaintext_len >= padded || padded - plaintext_len > BLOCK_SIZE {
        plaintext.zeroize();
        return Err(CipherError::LengthMismatch {
            expected: plaintext_len,
            padded,
        });
    }

    plaintext[plaintext_len..].zeroize();
    plaintext.truncate(plaintext_len);
    Ok(plaintext)
}

fn decrypt_blocks(
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
    key: &PasswordKey,
) -> Result<Vec<u8>, CipherError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::Misaligned(ciphertext.len()));
    }

    Aes256CbcDec::new(key.as_bytes().into(), &(*iv).into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CipherError::Misaligned(ciphertext.len()))
}
