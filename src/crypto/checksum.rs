// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SHA-256 checksums of file content.
//!
//! The checksum is handed to the uploader and later compared against the
//! decrypted bytes, so a recipient can confirm they got exactly what was sent.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Read size used when streaming input through the hasher.
const CHUNK_SIZE: usize = 4096;

/// Digest length in bytes.
pub const CHECKSUM_LEN: usize = 32;

/// A SHA-256 digest, displayed as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_LEN]);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ChecksumParseError {
    #[error("checksum must be {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("checksum is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Checksum {
    pub fn from_bytes(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = ChecksumParseError;

    /// Accepts upper or lower case and ignores surrounding whitespace,
    /// since recipients usually paste the value by hand.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != CHECKSUM_LEN * 2 {
            return Err(ChecksumParseError::Length {
                expected: CHECKSUM_LEN * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; CHECKSUM_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Checksum an in-memory buffer.
pub fn checksum(bytes: &[u8]) -> Checksum {
    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(CHUNK_SIZE) {
        hasher.update(chunk);
    }
    Checksum(hasher.finalize().into())
}

/// Checksum everything a reader yields, in bounded chunks.
pub fn checksum_reader<R: Read>(mut reader: R) -> io::Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Checksum(hasher.finalize().into()))
}
