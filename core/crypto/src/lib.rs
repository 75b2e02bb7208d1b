//! Cryptographic primitives for Cryptkeep.
//!
//! This module provides:
//! - Content checksums using SHA-256
//! - Per-file key material with a single transportable encoding
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Time-based one-time passwords (RFC 6238) for MFA
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod checksum;
pub mod engine;
pub mod material;
pub mod totp;

pub use checksum::digest;
pub use engine::{decrypt, encrypt, EncryptedPayload, ALGORITHM};
pub use material::{KeyMaterial, KEY_LENGTH, NONCE_LENGTH};
pub use totp::{provisioning_uri, verify_code, TotpSecret};
