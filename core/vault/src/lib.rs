//! Vault facade for Cryptkeep.
//!
//! The boundary the host UI calls into: session-gated file storage that
//! encrypts before persisting and independently verifies content
//! checksums after decrypting. File metadata is a validated, tagged
//! record; untyped shapes never reach the core, and key material never
//! reaches the metadata store.

pub mod facade;
pub mod metadata;

pub use facade::VaultFacade;
pub use metadata::{EncryptionInfo, FileMetadata};
