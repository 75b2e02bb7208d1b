//! File metadata records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cryptkeep_common::{Error, Result};

/// Encryption-related metadata persisted alongside a file.
///
/// Deliberately excludes the key material: that is surfaced to the user
/// exactly once at upload and never re-derivable if lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    /// Cipher tag, e.g. "xchacha20-poly1305".
    pub algorithm: String,
    /// SHA-256 hex digest of the ORIGINAL plaintext.
    pub checksum: String,
}

/// Metadata for one stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: Uuid,
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    pub tags: Vec<String>,
    pub shared: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Present for encrypted files; `None` for plaintext uploads.
    pub encryption: Option<EncryptionInfo>,
}

impl FileMetadata {
    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}
