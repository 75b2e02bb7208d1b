//! Persistence backend trait definition.

use async_trait::async_trait;

use cryptkeep_common::Result;

/// Abstract key-value persistence backend.
///
/// Keys are flat, `/`-separated strings (e.g. `account/<id>`); values are
/// opaque byte sequences. One implementation is selected at startup and
/// injected wherever durable state is needed.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Get the backend name (e.g. "memory", "local").
    fn name(&self) -> &str;

    /// Store a value under a key, overwriting any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Fetch the value stored under a key, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a key. Idempotent; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List all keys starting with the given prefix.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}
