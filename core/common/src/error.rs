//! Common error types for Cryptkeep.

use thiserror::Error;

/// Top-level error type for Cryptkeep operations.
///
/// Credential and cryptographic failures carry deliberately uniform
/// user-visible messages; callers that need audit detail log it at the
/// point of failure rather than encoding it here.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input, recoverable by re-prompting.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// An account with the same email already exists.
    #[error("An account with this email already exists")]
    DuplicateAccount,

    /// Login or password verification failed. The message never reveals
    /// whether the email was unknown or the password wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// MFA code rejected (wrong code, stale window, or expired challenge).
    #[error("Invalid authentication code")]
    InvalidMfaCode,

    /// Key-material string could not be parsed.
    #[error("Malformed key material: {0}")]
    MalformedKey(String),

    /// Cipher rejected the input. Never distinguishes wrong key from
    /// corrupted ciphertext.
    #[error("Invalid key or corrupted file")]
    Decryption,

    /// The platform could not supply cryptographically secure randomness.
    #[error("Secure randomness unavailable: {0}")]
    EntropySource(String),

    /// No active session; caller must re-authenticate.
    #[error("Session expired")]
    SessionExpired,

    /// Cryptographic operation failed for a reason other than rejection.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
