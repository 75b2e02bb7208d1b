//! Content integrity checksums using SHA-256.
//!
//! The digest is computed over plaintext before encryption and verified by
//! callers after decryption, independently of the cipher's own
//! authentication. This lets callers distinguish "cipher rejected the
//! input" from "cipher succeeded but content unexpectedly differs".

use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Compute the SHA-256 digest of `data`, rendered as lowercase hex.
///
/// Deterministic and infallible for any input, including empty input.
pub fn digest(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    let mut hex = String::with_capacity(hash.len() * 2);
    for byte in hash {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}
