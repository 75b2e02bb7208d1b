//! Persistence abstraction for Cryptkeep.
//!
//! The core never branches on storage medium: everything above this crate
//! talks to one `PersistenceBackend` selected at startup, whether that is
//! the in-memory backend (tests, ephemeral sessions) or the local
//! filesystem backend.
//!
//! # Design Principles
//! - Backend isolation: no medium-specific logic in auth or crypto modules
//! - Async operations: all I/O is async
//! - Unified error semantics: consistent error types across backends

pub mod backend;
pub mod local;
pub mod memory;
pub mod registry;

pub use backend::PersistenceBackend;
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use registry::{create_default_registry, BackendFactory, BackendRegistry};
