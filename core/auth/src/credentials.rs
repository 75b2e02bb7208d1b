//! Account records and credential persistence.
//!
//! Passwords are hashed with Argon2id into PHC strings (salted, slow);
//! verification is constant-time inside the argon2 crate. Email uniqueness
//! is case-sensitive, a documented fixed policy: `Demo@example.com` and
//! `demo@example.com` are distinct accounts.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use cryptkeep_common::{Error, Result};
use cryptkeep_storage::PersistenceBackend;

/// Key prefix for account records.
const ACCOUNT_PREFIX: &str = "account/";

/// Key prefix for the email -> account id index.
const EMAIL_PREFIX: &str = "email/";

/// A registered user account.
///
/// `password_hash` and `mfa_secret` are mutated only by explicit
/// change/setup operations; accounts are never deleted.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub mfa_enabled: bool,
    /// Base32-encoded TOTP shared secret, present once MFA is enrolled.
    pub mfa_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("mfa_enabled", &self.mfa_enabled)
            .field("mfa_secret", &self.mfa_secret.as_ref().map(|_| "[REDACTED]"))
            .field("created_at", &self.created_at)
            .field("last_login", &self.last_login)
            .finish()
    }
}

/// Persists accounts through the storage backend.
///
/// Records live under `account/<id>` with an `email/<email>` index for
/// login lookup.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn PersistenceBackend>,
}

impl CredentialStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Register a new account.
    ///
    /// # Preconditions
    /// - Email and password must be non-empty (validated by the caller)
    ///
    /// # Errors
    /// - `Error::DuplicateAccount` if the email is already registered
    ///   (case-sensitive comparison)
    pub async fn register(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<Account> {
        let email_key = format!("{}{}", EMAIL_PREFIX, email);
        if self.backend.exists(&email_key).await? {
            return Err(Error::DuplicateAccount);
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: self.hash_password(password)?,
            mfa_enabled: false,
            mfa_secret: None,
            created_at: now,
            last_login: None,
        };

        self.save(&account).await?;
        self.backend
            .put(&email_key, account.id.to_string().into_bytes())
            .await?;

        Ok(account)
    }

    /// Hash a password into an Argon2id PHC string with a random salt.
    ///
    /// # Errors
    /// - `Error::Validation` on an empty password
    pub fn hash_password(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(Error::Validation("Password cannot be empty".to_string()));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Crypto(format!("Password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verify a password against an account's stored hash.
    ///
    /// Any parse or verification failure yields `false`; the comparison
    /// itself is constant-time.
    pub fn verify_password(&self, account: &Account, password: &str) -> bool {
        match PasswordHash::new(&account.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Find an account by email (case-sensitive), if registered.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email_key = format!("{}{}", EMAIL_PREFIX, email);
        let Some(id_bytes) = self.backend.get(&email_key).await? else {
            return Ok(None);
        };
        let id = String::from_utf8(id_bytes)
            .map_err(|_| Error::Serialization("Corrupt email index entry".to_string()))?;
        let id = Uuid::parse_str(&id)
            .map_err(|_| Error::Serialization("Corrupt email index entry".to_string()))?;
        self.find_by_id(id).await
    }

    /// Find an account by id, if it exists.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let key = format!("{}{}", ACCOUNT_PREFIX, id);
        match self.backend.get(&key).await? {
            Some(bytes) => {
                let account = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// Enroll or re-enroll MFA for an account.
    ///
    /// Idempotent; re-setup overwrites the prior secret, so codes computed
    /// from the old secret become invalid immediately.
    pub async fn set_mfa(&self, id: Uuid, secret_base32: String) -> Result<Account> {
        let mut account = self.require(id).await?;
        account.mfa_enabled = true;
        account.mfa_secret = Some(secret_base32);
        self.save(&account).await?;
        Ok(account)
    }

    /// Replace an account's password hash.
    ///
    /// Existing sessions remain valid; invalidating them on password
    /// change is an explicit non-goal.
    pub async fn update_password(&self, id: Uuid, new_hash: String) -> Result<Account> {
        let mut account = self.require(id).await?;
        account.password_hash = new_hash;
        self.save(&account).await?;
        Ok(account)
    }

    /// Stamp the account's last successful login.
    pub async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<Account> {
        let mut account = self.require(id).await?;
        account.last_login = Some(at);
        self.save(&account).await?;
        Ok(account)
    }

    async fn require(&self, id: Uuid) -> Result<Account> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Account {}", id)))
    }

    async fn save(&self, account: &Account) -> Result<()> {
        let key = format!("{}{}", ACCOUNT_PREFIX, account.id);
        let bytes =
            serde_json::to_vec(account).map_err(|e| Error::Serialization(e.to_string()))?;
        self.backend.put(&key, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptkeep_storage::MemoryBackend;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_register_and_find() {
        let store = store();
        let account = store
            .register("demo@example.com", "Password123!", Utc::now())
            .await
            .unwrap();

        let found = store.find_by_email("demo@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(!found.mfa_enabled);
        assert!(found.last_login.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let store = store();
        store
            .register("demo@example.com", "first", Utc::now())
            .await
            .unwrap();

        let result = store.register("demo@example.com", "second", Utc::now()).await;
        assert!(matches!(result, Err(Error::DuplicateAccount)));
    }

    #[tokio::test]
    async fn test_email_comparison_is_case_sensitive() {
        let store = store();
        store
            .register("demo@example.com", "pw", Utc::now())
            .await
            .unwrap();

        // Different casing is a different account under the fixed policy.
        assert!(store
            .register("Demo@example.com", "pw", Utc::now())
            .await
            .is_ok());
        assert!(store.find_by_email("DEMO@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_verification() {
        let store = store();
        let account = store
            .register("demo@example.com", "correct horse", Utc::now())
            .await
            .unwrap();

        assert!(store.verify_password(&account, "correct horse"));
        assert!(!store.verify_password(&account, "battery staple"));
    }

    #[tokio::test]
    async fn test_hash_is_salted() {
        let store = store();
        let h1 = store.hash_password("same password").unwrap();
        let h2 = store.hash_password("same password").unwrap();
        assert_ne!(h1, h2);
        assert!(h1.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_empty_password_rejected() {
        let store = store();
        assert!(matches!(
            store.hash_password(""),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_mfa_overwrites_prior_secret() {
        let store = store();
        let account = store
            .register("demo@example.com", "pw", Utc::now())
            .await
            .unwrap();

        store.set_mfa(account.id, "SECRETONE".to_string()).await.unwrap();
        let updated = store.set_mfa(account.id, "SECRETTWO".to_string()).await.unwrap();

        assert!(updated.mfa_enabled);
        assert_eq!(updated.mfa_secret.as_deref(), Some("SECRETTWO"));
    }

    #[tokio::test]
    async fn test_update_password() {
        let store = store();
        let account = store
            .register("demo@example.com", "old", Utc::now())
            .await
            .unwrap();

        let new_hash = store.hash_password("new").unwrap();
        let updated = store.update_password(account.id, new_hash).await.unwrap();

        assert!(store.verify_password(&updated, "new"));
        assert!(!store.verify_password(&updated, "old"));
    }

    #[tokio::test]
    async fn test_debug_redacts_secrets() {
        let store = store();
        let mut account = store
            .register("demo@example.com", "pw", Utc::now())
            .await
            .unwrap();
        account.mfa_secret = Some("SECRET".to_string());

        let rendered = format!("{:?}", account);
        assert!(!rendered.contains(&account.password_hash));
        assert!(!rendered.contains("SECRET\""));
        assert!(rendered.contains("[REDACTED]"));
    }
}
