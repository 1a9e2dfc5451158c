//! Command-line interface for Prairie.
//!
//! The `prairie` binary ingests pre-tokenized samples into a graph store,
//! reconstructs the sequences running between two k-mers, and reports
//! graph statistics.
//!
//! # Key Abstractions
//!
//! - [`PrairieCli`]: application object parameterized over its configuration
//! - [`StoreConfig`]: what the store factory needs from a configuration
//! - [`PrairieConfig`]: the file/env-backed default configuration

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod factory;
pub mod handlers;

pub use app::PrairieCli;
pub use cli::{CliArgs, Command, ConfigAction};
pub use config::PrairieConfig;
pub use factory::{StoreConfig, open_store};
