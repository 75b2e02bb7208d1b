//! Session-gated encrypted file operations.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metadata::{EncryptionInfo, FileMetadata};
use cryptkeep_auth::{Session, SessionManager};
use cryptkeep_common::{Error, Result};
use cryptkeep_crypto::{checksum, engine};
use cryptkeep_storage::PersistenceBackend;

/// Key prefix for file metadata records.
const FILE_PREFIX: &str = "file/";

/// Key prefix for encrypted file content.
const CONTENT_PREFIX: &str = "content/";

/// The file-CRUD boundary the host UI calls into.
///
/// Every operation re-checks the session (lazy expiry applies) and
/// touches it, so ordinary usage keeps the session alive.
pub struct VaultFacade {
    backend: Arc<dyn PersistenceBackend>,
    sessions: Arc<SessionManager>,
}

impl VaultFacade {
    /// Create a facade over the given backend and session manager.
    pub fn new(backend: Arc<dyn PersistenceBackend>, sessions: Arc<SessionManager>) -> Self {
        Self { backend, sessions }
    }

    /// Encrypt and persist a file.
    ///
    /// Nothing is persisted until encryption has completed; the ciphertext
    /// and metadata are committed together only on success.
    ///
    /// # Postconditions
    /// - Ciphertext is stored under `content/<id>`, metadata under
    ///   `file/<id>`; the metadata carries algorithm + checksum but never
    ///   the key material
    /// - The returned key-material string is the only copy; the caller
    ///   must surface it to the user exactly once
    ///
    /// # Errors
    /// - `Error::SessionExpired` without an active session
    /// - `Error::Validation` on an empty file name
    pub async fn store_encrypted(
        &self,
        name: &str,
        content: &[u8],
        tags: Vec<String>,
    ) -> Result<(FileMetadata, String)> {
        self.require_session().await?;

        if name.is_empty() {
            return Err(Error::Validation("File name cannot be empty".to_string()));
        }

        debug!(name, size = content.len(), "Encrypting file");
        let payload = engine::encrypt(content)?;

        let now = chrono::Utc::now();
        let metadata = FileMetadata {
            id: Uuid::new_v4(),
            name: name.to_string(),
            size: content.len() as u64,
            tags,
            shared: false,
            created_at: now,
            modified_at: now,
            encryption: Some(EncryptionInfo {
                algorithm: payload.algorithm.clone(),
                checksum: payload.checksum.clone(),
            }),
        };

        self.backend
            .put(&format!("{}{}", CONTENT_PREFIX, metadata.id), payload.ciphertext)
            .await?;
        self.backend
            .put(&format!("{}{}", FILE_PREFIX, metadata.id), metadata.to_bytes()?)
            .await?;

        info!(name, id = %metadata.id, "File stored encrypted");
        Ok((metadata, payload.key_material))
    }

    /// Decrypt a stored file with the user-supplied key-material string.
    ///
    /// After a successful decrypt, the plaintext digest is independently
    /// compared against the stored checksum; a mismatch is reported as
    /// `Error::Decryption`, indistinguishable from a cipher rejection.
    ///
    /// # Errors
    /// - `Error::SessionExpired` without an active session
    /// - `Error::NotFound` for an unknown file id
    /// - `Error::MalformedKey` / `Error::Decryption` from the engine
    pub async fn retrieve_decrypted(&self, id: Uuid, key_material: &str) -> Result<Vec<u8>> {
        self.require_session().await?;

        let metadata = self.load_metadata(id).await?;
        let encryption = metadata
            .encryption
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("File {} is not encrypted", id)))?;

        let ciphertext = self
            .backend
            .get(&format!("{}{}", CONTENT_PREFIX, id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Content for file {}", id)))?;

        let plaintext = engine::decrypt(&ciphertext, key_material)?;

        if checksum::digest(&plaintext) != encryption.checksum {
            warn!(id = %id, "Checksum mismatch after decrypt");
            return Err(Error::Decryption);
        }

        debug!(id = %id, size = plaintext.len(), "File decrypted");
        Ok(plaintext)
    }

    /// List all file metadata records.
    pub async fn list_files(&self) -> Result<Vec<FileMetadata>> {
        self.require_session().await?;

        let mut files = Vec::new();
        for key in self.backend.keys(FILE_PREFIX).await? {
            if let Some(bytes) = self.backend.get(&key).await? {
                files.push(FileMetadata::from_bytes(&bytes)?);
            }
        }
        files.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(files)
    }

    /// Delete a file's content and metadata.
    pub async fn delete_file(&self, id: Uuid) -> Result<()> {
        self.require_session().await?;

        // Ensure it exists so deletes of unknown ids surface as NotFound.
        self.load_metadata(id).await?;

        self.backend
            .delete(&format!("{}{}", CONTENT_PREFIX, id))
            .await?;
        self.backend.delete(&format!("{}{}", FILE_PREFIX, id)).await?;

        info!(id = %id, "File deleted");
        Ok(())
    }

    /// Replace a file's tags.
    pub async fn set_tags(&self, id: Uuid, tags: Vec<String>) -> Result<FileMetadata> {
        self.update_metadata(id, |metadata| metadata.tags = tags).await
    }

    /// Toggle a file's shared flag.
    pub async fn set_shared(&self, id: Uuid, shared: bool) -> Result<FileMetadata> {
        self.update_metadata(id, |metadata| metadata.shared = shared).await
    }

    /// Gate access on the active session and record the activity.
    async fn require_session(&self) -> Result<Session> {
        let session = self
            .sessions
            .current_session()
            .await
            .ok_or(Error::SessionExpired)?;
        self.sessions.touch().await;
        Ok(session)
    }

    async fn load_metadata(&self, id: Uuid) -> Result<FileMetadata> {
        let bytes = self
            .backend
            .get(&format!("{}{}", FILE_PREFIX, id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("File {}", id)))?;
        FileMetadata::from_bytes(&bytes)
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        mutate: impl FnOnce(&mut FileMetadata),
    ) -> Result<FileMetadata> {
        self.require_session().await?;

        let mut metadata = self.load_metadata(id).await?;
        mutate(&mut metadata);
        metadata.modified_at = chrono::Utc::now();

        self.backend
            .put(&format!("{}{}", FILE_PREFIX, id), metadata.to_bytes()?)
            .await?;
        Ok(metadata)
    }
}
