// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptographic Primitives
//!
//! Stateless building blocks used by the access workflow:
//!
//! - [`checksum`] - SHA-256 content digests for integrity confirmation
//! - [`cipher`] - password key derivation and AES-256-CBC file encryption
//!
//! ## Known Limitations
//!
//! These primitives keep the legacy on-disk format:
//!
//! - Keys are `SHA-256(password)` with no salt and no work factor.
//! - CBC is unauthenticated. Tampering is only detected by the separate
//!   checksum comparison, which is not bound to the ciphertext.
//! - Padding is a run of zero bytes. Without a recorded plaintext length,
//!   trailing `0x00` bytes of the plaintext are lost on decryption.

pub mod checksum;
pub mod cipher;

pub use checksum::{checksum, checksum_reader, Checksum, ChecksumParseError};
pub use cipher::{
    decrypt, decrypt_exact, derive_key, encrypt, CipherError, EncryptedPayload, PasswordKey,
    BLOCK_SIZE, IV_SIZE,
};
