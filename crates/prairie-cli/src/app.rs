//! PrairieCli application.
//!
//! Provides the CLI application that dispatches parsed arguments to the
//! handlers, parameterized over its [`StoreConfig`].

use std::sync::Arc;

use prairie_core::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};
use crate::config::PrairieConfig;
use crate::factory::StoreConfig;
use crate::{config_handlers, handlers};

// ============================================================================
// PrairieCli
// ============================================================================

/// CLI application parameterized over a configuration.
pub struct PrairieCli<C: StoreConfig> {
    name: String,
    config: Arc<C>,
    version: String,
}

impl PrairieCli<PrairieConfig> {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = PrairieConfig::load(args.config.as_deref())?;
        Ok(Self::new(name, config))
    }
}

impl<C: StoreConfig> PrairieCli<C> {
    /// Create a new CLI application.
    pub fn new(name: impl Into<String>, config: C) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` if set, otherwise a level from the verbosity flags.
    /// Records from the `log` facade used by the library crates are bridged.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be installed (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);
        tracing::debug!(command = ?args.command, "dispatching");

        match args.command {
            Some(Command::Query {
                src,
                dst,
                backend,
                overlap,
            }) => handlers::handle_query(&*self.config, &src, &dst, backend, overlap).await,
            Some(Command::Ingest {
                sample,
                pairs,
                backend,
                stage,
            }) => {
                if stage {
                    handlers::handle_stage(&*self.config, &sample, &pairs)
                        .await
                        .map(|_| ())
                } else {
                    handlers::handle_ingest(&*self.config, &sample, &pairs, backend).await
                }
            }
            Some(Command::Stats { backend }) => handlers::handle_stats(&*self.config, backend)
                .await
                .map(|_| ()),
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            None => {
                println!("{} {} (use --help for usage)", self.name, self.version);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> PrairieConfig {
        PrairieConfig {
            base_path: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_prairie_cli_new() {
        let dir = TempDir::new().unwrap();
        let cli = PrairieCli::new("prairie", test_config(&dir)).with_version("1.2.3");
        assert_eq!(cli.name, "prairie");
        assert_eq!(cli.version, "1.2.3");
        assert_eq!(cli.config().project_name, "prairie");
    }

    #[tokio::test]
    async fn test_run_version_command() {
        let dir = TempDir::new().unwrap();
        let cli = PrairieCli::new("prairie", test_config(&dir));
        let args = CliArgs::parse_from(["prairie", "version"]);
        assert!(cli.run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_no_command() {
        let dir = TempDir::new().unwrap();
        let cli = PrairieCli::new("prairie", test_config(&dir));
        let args = CliArgs::parse_from(["prairie"]);
        assert!(cli.run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_ingest_then_query() {
        let dir = TempDir::new().unwrap();
        let pairs = dir.path().join("s1.tsv");
        std::fs::write(&pairs, ">c1\tAAAC\n>c1\tAACG\n>c1\tACGT\n").unwrap();
        let cli = PrairieCli::new("prairie", test_config(&dir));

        let ingest = CliArgs::parse_from([
            "prairie",
            "ingest",
            "s1",
            pairs.to_str().unwrap(),
            "--backend",
            "embedded",
        ]);
        cli.run(ingest).await.unwrap();

        let query = CliArgs::parse_from([
            "prairie", "query", "AAAC", "ACGT", "--backend", "embedded", "--overlap", "3",
        ]);
        cli.run(query).await.unwrap();

        let stats = CliArgs::parse_from(["prairie", "stats", "--backend", "embedded"]);
        cli.run(stats).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_ingest_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let cli = PrairieCli::new("prairie", test_config(&dir));
        let args = CliArgs::parse_from(["prairie", "ingest", "s1", "/nonexistent/s1.tsv"]);
        assert!(cli.run(args).await.is_err());
    }

    #[test]
    fn test_from_args_with_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "project_name = \"from-file\"\n[graph]\nk = 21\n").unwrap();

        let args = CliArgs::parse_from(["prairie", "--config", path.to_str().unwrap()]);
        let cli = PrairieCli::from_args("prairie", &args).unwrap();
        assert_eq!(cli.config().project_name, "from-file");
        assert_eq!(cli.config().graph.k, 21);
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let cli = PrairieCli::new("prairie", test_config(&dir));
        cli.init_logging(true, false);
        cli.init_logging(false, true);
    }
}
