//! Per-file key material with secure memory handling.
//!
//! Every encryption operation uses a fresh key and nonce, never reused
//! across files. The pair travels as a single user-copyable string so the
//! user has one "decryption key" artifact to save; a reviewed usability
//! trade-off, not accidental key bundling.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use cryptkeep_common::{Error, Result};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Nonce size for XChaCha20-Poly1305 (24 bytes, safe for random generation).
pub const NONCE_LENGTH: usize = 24;

/// Separator between the key and nonce segments in the encoded form.
const SEPARATOR: char = '.';

/// Symmetric key and nonce for one encryption operation.
///
/// Transportable form is `base64(key) + "." + base64(nonce)`. Memory is
/// zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LENGTH],
    nonce: [u8; NONCE_LENGTH],
}

impl KeyMaterial {
    /// Generate fresh random key material from the OS entropy source.
    ///
    /// # Errors
    /// - `Error::EntropySource` if the platform cannot supply
    ///   cryptographically secure randomness
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_LENGTH];
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| Error::EntropySource(e.to_string()))?;
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| Error::EntropySource(e.to_string()))?;
        Ok(Self { key, nonce })
    }

    /// Create key material from raw parts.
    pub fn from_parts(key: [u8; KEY_LENGTH], nonce: [u8; NONCE_LENGTH]) -> Self {
        Self { key, nonce }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn key(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Get the nonce bytes.
    pub fn nonce(&self) -> &[u8; NONCE_LENGTH] {
        &self.nonce
    }

    /// Encode as the transportable string `base64(key) + "." + base64(nonce)`.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            STANDARD.encode(self.key),
            SEPARATOR,
            STANDARD.encode(self.nonce)
        )
    }

    /// Decode key material from its transportable string form.
    ///
    /// Splits on the first `.`; both segments must be non-empty, valid
    /// base64, and decode to exactly the required key/nonce lengths.
    ///
    /// # Errors
    /// - `Error::MalformedKey` for any violation above
    pub fn decode(encoded: &str) -> Result<Self> {
        let (key_part, nonce_part) = encoded
            .split_once(SEPARATOR)
            .ok_or_else(|| Error::MalformedKey("missing separator".to_string()))?;

        if key_part.is_empty() || nonce_part.is_empty() {
            return Err(Error::MalformedKey("empty segment".to_string()));
        }

        let mut key_bytes = STANDARD
            .decode(key_part)
            .map_err(|_| Error::MalformedKey("key segment is not valid base64".to_string()))?;
        let mut nonce_bytes = STANDARD
            .decode(nonce_part)
            .map_err(|_| Error::MalformedKey("nonce segment is not valid base64".to_string()))?;

        if key_bytes.len() != KEY_LENGTH {
            key_bytes.zeroize();
            nonce_bytes.zeroize();
            return Err(Error::MalformedKey(format!(
                "key must be {} bytes",
                KEY_LENGTH
            )));
        }
        if nonce_bytes.len() != NONCE_LENGTH {
            key_bytes.zeroize();
            nonce_bytes.zeroize();
            return Err(Error::MalformedKey(format!(
                "nonce must be {} bytes",
                NONCE_LENGTH
            )));
        }

        let mut key = [0u8; KEY_LENGTH];
        let mut nonce = [0u8; NONCE_LENGTH];
        key.copy_from_slice(&key_bytes);
        nonce.copy_from_slice(&nonce_bytes);
        key_bytes.zeroize();
        nonce_bytes.zeroize();

        Ok(Self { key, nonce })
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        let a = KeyMaterial::generate().unwrap();
        let b = KeyMaterial::generate().unwrap();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let material = KeyMaterial::generate().unwrap();
        let decoded = KeyMaterial::decode(&material.encode()).unwrap();
        assert_eq!(material.key(), decoded.key());
        assert_eq!(material.nonce(), decoded.nonce());
    }

    #[test]
    fn test_decode_missing_separator() {
        let result = KeyMaterial::decode("bm9zZXBhcmF0b3I");
        assert!(matches!(result, Err(Error::MalformedKey(_))));
    }

    #[test]
    fn test_decode_empty_segments() {
        assert!(matches!(
            KeyMaterial::decode(".abcd"),
            Err(Error::MalformedKey(_))
        ));
        assert!(matches!(
            KeyMaterial::decode("abcd."),
            Err(Error::MalformedKey(_))
        ));
        assert!(matches!(
            KeyMaterial::decode("."),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = KeyMaterial::decode("not*base64.YWJjZA==");
        assert!(matches!(result, Err(Error::MalformedKey(_))));
    }

    #[test]
    fn test_decode_wrong_lengths() {
        // Valid base64 but too short for key/nonce.
        let short = STANDARD.encode([0u8; 8]);
        let encoded = format!("{}.{}", short, short);
        assert!(matches!(
            KeyMaterial::decode(&encoded),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let material = KeyMaterial::generate().unwrap();
        let rendered = format!("{:?}", material);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains(&material.encode()));
    }
}
