use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::StorageError;

/// Prefix under which every blob lives in the content store.
pub const BLOB_KEY_PREFIX: &str = "blobs";

/// A validated SHA-256 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Construct from raw SHA-256 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded content hash string.
    ///
    /// Uppercase input is accepted; the canonical form is always lowercase.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != 64 {
            return Err(StorageError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }

        let bytes =
            hex::decode(s).map_err(|e| StorageError::InvalidHash(format!("invalid hex: {e}")))?;

        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidHash("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Return the hash as a 64-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Return the raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Return the first 2 hex characters (shard prefix).
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Return the remaining 62 hex characters.
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }

    /// Deterministic content-store key for this hash.
    ///
    /// Layout: `blobs/{first 2 hex chars}/{remaining 62 hex chars}`.
    pub fn blob_key(&self) -> String {
        format!(
            "{BLOB_KEY_PREFIX}/{}/{}",
            self.shard_prefix(),
            self.shard_suffix()
        )
    }

    /// Recover the hash from a key produced by [`ContentHash::blob_key`].
    pub fn from_blob_key(key: &str) -> Result<Self, StorageError> {
        let rest = key
            .strip_prefix(BLOB_KEY_PREFIX)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| StorageError::InvalidHash(format!("not a blob key: {key}")))?;

        let (prefix, suffix) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidHash(format!("not a blob key: {key}")))?;

        if prefix.len() != 2 {
            return Err(StorageError::InvalidHash(format!("not a blob key: {key}")));
        }

        Self::from_hex(&format!("{prefix}{suffix}"))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
