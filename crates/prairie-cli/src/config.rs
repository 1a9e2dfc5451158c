//! Configuration for the `prairie` CLI.
//!
//! Provides [`PrairieConfig`], loaded from TOML files, environment variables,
//! and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `PRAIRIE_CONFIG` environment variable
//! 3. XDG default: `~/.config/prairie/config.toml`
//! 4. Built-in defaults
//!
//! `PRAIRIE_<SECTION>_<KEY>` environment variables are overlaid last.

use std::path::PathBuf;

use confyg::{Confygery, env};
use prairie_core::traits::ConfigProvider;
use prairie_core::util::paths::expand_tilde;
use prairie_core::{Error, Result};
use prairie_dgraph::DgraphConfig;
use prairie_graph::Backend;
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrairieConfig {
    /// Project name, used for env var prefixes and default paths.
    pub project_name: String,

    /// Base path for on-disk stores.
    pub base_path: Option<String>,

    /// Graph construction and query settings.
    pub graph: GraphSettings,

    /// In-memory store settings.
    pub memory: MemorySettings,

    /// Embedded store settings.
    pub embedded: EmbeddedSettings,

    /// Networked store settings.
    pub dgraph: DgraphConfig,
}

/// Graph construction and query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// K-mer length the graph was built with.
    pub k: usize,

    /// Store used when a command does not name one.
    pub backend: Backend,

    /// Characters shared by consecutive k-mers; `k - 1` when unset.
    pub overlap: Option<usize>,
}

/// In-memory store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// JSON snapshot loaded on open and written after ingest.
    pub snapshot: Option<String>,
}

/// Embedded store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedSettings {
    /// Database file.
    pub path: Option<String>,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for PrairieConfig {
    fn default() -> Self {
        Self {
            project_name: "prairie".to_string(),
            base_path: None,
            graph: GraphSettings::default(),
            memory: MemorySettings::default(),
            embedded: EmbeddedSettings::default(),
            dgraph: DgraphConfig::default(),
        }
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            k: 11,
            backend: Backend::Embedded,
            overlap: None,
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl PrairieConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("PRAIRIE");
        env_opts.add_section("graph");
        env_opts.add_section("memory");
        env_opts.add_section("embedded");
        env_opts.add_section("dgraph");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no command could run with.
    pub fn validate(&self) -> Result<()> {
        if self.graph.k == 0 {
            return Err(Error::config("graph.k must be at least 1"));
        }
        if let Some(overlap) = self.graph.overlap
            && overlap >= self.graph.k
        {
            return Err(Error::config(format!(
                "graph.overlap ({overlap}) must be smaller than graph.k ({})",
                self.graph.k
            )));
        }
        self.dgraph.validate()
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("PRAIRIE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("prairie").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Characters dropped from each k-mer after the first when reassembling.
    pub fn overlap(&self) -> usize {
        self.graph
            .overlap
            .unwrap_or_else(|| self.graph.k.saturating_sub(1))
    }
}

// ============================================================================
// ConfigProvider implementation
// ============================================================================

impl ConfigProvider for PrairieConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(p) => Ok(expand_tilde(p)),
            None => std::env::current_dir()
                .map_err(|e| Error::config(format!("Could not determine base path: {e}"))),
        }
    }

    fn store_path(&self, store: &str) -> Result<PathBuf> {
        let explicit = match store {
            "embedded" => self.embedded.path.as_deref(),
            "snapshot" => self.memory.snapshot.as_deref(),
            "staging" => None,
            other => return Err(Error::config(format!("Unknown store: {other}"))),
        };
        if let Some(p) = explicit {
            return Ok(expand_tilde(p));
        }
        let file = match store {
            "embedded" => "pangenome.redb",
            "snapshot" => "pangenome.json",
            _ => "rdf",
        };
        Ok(self.base_path()?.join(file))
    }
}

// ============================================================================
// Tests
// ============================================================================
