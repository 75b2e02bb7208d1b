//! Authenticated file encryption using XChaCha20-Poly1305.
//!
//! Each call to [`encrypt`] generates fresh key material; the 24-byte
//! nonce is safe for random generation. The returned payload carries the
//! encoded key material and a checksum of the original plaintext so the
//! caller can verify content integrity after a successful decrypt.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    XChaCha20Poly1305,
};
use serde::{Deserialize, Serialize};

use crate::checksum;
use crate::material::KeyMaterial;
use cryptkeep_common::{Error, Result};

/// Algorithm tag recorded alongside every payload.
pub const ALGORITHM: &str = "xchacha20-poly1305";

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Result of encrypting a byte sequence.
///
/// The checksum is computed over the ORIGINAL plaintext, not the
/// ciphertext. Key material is carried in its encoded transportable form;
/// persisting it alongside the ciphertext defeats the design, so callers
/// surface it to the user exactly once instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub algorithm: String,
    pub key_material: String,
    pub checksum: String,
}

/// Encrypt plaintext under fresh random key material.
///
/// # Postconditions
/// - Key material is freshly generated, never reused across files
/// - `checksum` is the SHA-256 digest of `plaintext`
/// - Ciphertext length is plaintext length + TAG_SIZE
///
/// # Errors
/// - `Error::EntropySource` if the OS RNG fails; there is no other error
///   path for well-formed input
pub fn encrypt(plaintext: &[u8]) -> Result<EncryptedPayload> {
    let material = KeyMaterial::generate()?;
    let checksum = checksum::digest(plaintext);
    let ciphertext = seal(&material, plaintext)?;

    Ok(EncryptedPayload {
        ciphertext,
        algorithm: ALGORITHM.to_string(),
        key_material: material.encode(),
        checksum,
    })
}

/// Decrypt ciphertext using an encoded key-material string.
///
/// Does NOT re-verify the plaintext checksum; that is a separate,
/// caller-visible step so "cipher rejected the input" and "content
/// unexpectedly differs" stay distinguishable.
///
/// # Errors
/// - `Error::MalformedKey` if the key-material string cannot be decoded,
///   propagated unchanged
/// - `Error::Decryption` if the cipher rejects the ciphertext (wrong key,
///   truncated data, or authentication-tag mismatch)
pub fn decrypt(ciphertext: &[u8], key_material: &str) -> Result<Vec<u8>> {
    let material = KeyMaterial::decode(key_material)?;
    open(&material, ciphertext)
}

/// Encrypt plaintext under explicit key material.
///
/// Deterministic given fixed material and plaintext. [`encrypt`] is the
/// normal entry point; this exists for callers that already hold material.
pub fn seal(material: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(material.key()));
    cipher
        .encrypt(GenericArray::from_slice(material.nonce()), plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
}

/// Decrypt ciphertext under explicit key material.
///
/// # Errors
/// - `Error::Decryption` on truncated input or authentication failure
pub fn open(material: &KeyMaterial, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::Decryption);
    }

    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(material.key()));
    cipher
        .decrypt(GenericArray::from_slice(material.nonce()), ciphertext)
        .map_err(|_| Error::Decryption)
}
