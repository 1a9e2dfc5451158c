//! Shared errors, traits, and utilities for the Prairie crates.
//!
//! This crate provides the foundational types used across all Prairie crates.
//! It has no internal Prairie dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`traits`]: Configuration abstraction
//! - [`util`]: Path helpers (tilde expansion, executable lookup)

pub mod error;
pub mod traits;
pub mod util;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use traits::ConfigProvider;
