//! Utility modules.
//!
//! # Modules
//!
//! - [`paths`]: Path resolution helpers (tilde expansion, executable lookup)

pub mod paths;
