//! Time-based one-time passwords (RFC 6238) for MFA.
//!
//! HMAC-SHA1, 6 digits, 30-second step, one step of clock-skew tolerance
//! in each direction. Codes are verified with constant-time comparison;
//! "accept any 6-digit string" is exactly the defect this module exists to
//! avoid.

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use cryptkeep_common::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Number of digits in a generated code.
pub const DIGITS: usize = 6;

/// Time step in seconds.
pub const STEP_SECONDS: u64 = 30;

/// Accepted clock skew, in steps, on either side of the current window.
pub const SKEW_STEPS: i64 = 1;

/// Shared-secret length in bytes (160-bit, the RFC 4226 recommendation).
pub const SECRET_LENGTH: usize = 20;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// TOTP shared secret. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TotpSecret {
    bytes: Vec<u8>,
}

impl TotpSecret {
    /// Generate a fresh random secret.
    ///
    /// # Errors
    /// - `Error::EntropySource` if the OS RNG fails
    pub fn generate() -> Result<Self> {
        let mut bytes = vec![0u8; SECRET_LENGTH];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::EntropySource(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Parse a secret from its base32 rendering (unpadded RFC 4648).
    ///
    /// # Errors
    /// - `Error::Validation` on invalid base32 or an empty secret
    pub fn from_base32(encoded: &str) -> Result<Self> {
        let bytes = base32::decode(BASE32, encoded)
            .ok_or_else(|| Error::Validation("MFA secret is not valid base32".to_string()))?;
        if bytes.is_empty() {
            return Err(Error::Validation("MFA secret cannot be empty".to_string()));
        }
        Ok(Self { bytes })
    }

    /// Create a secret from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Base32 rendering for manual entry and provisioning URIs.
    pub fn to_base32(&self) -> String {
        base32::encode(BASE32, &self.bytes)
    }

    /// Get the raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TotpSecret([REDACTED])")
    }
}

/// RFC 4226 HOTP: HMAC-SHA1 with dynamic truncation to a 31-bit value.
fn hotp(secret: &[u8], counter: u64) -> Result<u32> {
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| Error::Crypto(format!("Invalid HMAC key: {}", e)))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let truncated = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    Ok(truncated)
}

/// Compute the 6-digit code for the window containing `unix_time`.
pub fn code_at(secret: &TotpSecret, unix_time: u64) -> Result<String> {
    let counter = unix_time / STEP_SECONDS;
    let value = hotp(secret.as_bytes(), counter)? % 10u32.pow(DIGITS as u32);
    Ok(format!("{:0width$}", value, width = DIGITS))
}

/// Verify a code against the secret at `unix_time`.
///
/// Accepts the current window plus `SKEW_STEPS` windows on either side.
/// Comparison is constant-time across all candidate windows; malformed
/// input (wrong length, non-digits) is rejected outright.
pub fn verify_code(secret: &TotpSecret, code: &str, unix_time: u64) -> bool {
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let current = (unix_time / STEP_SECONDS) as i64;
    let mut matched = subtle::Choice::from(0u8);

    for offset in -SKEW_STEPS..=SKEW_STEPS {
        let counter = current + offset;
        if counter < 0 {
            continue;
        }
        let value = match hotp(secret.as_bytes(), counter as u64) {
            Ok(v) => v % 10u32.pow(DIGITS as u32),
            Err(_) => return false,
        };
        let candidate = format!("{:0width$}", value, width = DIGITS);
        matched |= candidate.as_bytes().ct_eq(code.as_bytes());
    }

    matched.into()
}

/// Build the `otpauth://` provisioning URI consumed by authenticator apps.
///
/// QR rendering belongs to an external collaborator; the core only emits
/// the URI string and the raw secret for manual entry.
pub fn provisioning_uri(secret: &TotpSecret, issuer: &str, account: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={digits}&period={period}",
        issuer = issuer,
        account = account,
        secret = secret.to_base32(),
        digits = DIGITS,
        period = STEP_SECONDS,
    )
}
