//! Credential and session management for Cryptkeep.
//!
//! This module provides:
//! - Account registration with Argon2id password hashing
//! - Optional TOTP MFA enrollment and verification
//! - Session lifecycle with sliding expiration and inactivity timeout
//!
//! # Architecture
//! `SessionManager` owns the single active session and the login state
//! machine; `CredentialStore` persists accounts through the storage
//! backend. Both take their collaborators by injection (backend, clock) so
//! expiry and MFA windows are deterministic under test.

pub mod clock;
pub mod credentials;
pub mod session;

pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{Account, CredentialStore};
pub use session::{LoginResult, MfaEnrollment, Session, SessionConfig, SessionManager};
