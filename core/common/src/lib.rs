//! Common types shared across Cryptkeep modules.
//!
//! The error taxonomy lives here so every crate in the workspace reports
//! failures through the same typed surface.

pub mod error;

pub use error::{Error, Result};
