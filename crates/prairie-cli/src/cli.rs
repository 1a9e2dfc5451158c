//! CLI argument parsing and command definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use prairie_graph::Backend;

// ============================================================================
// CLI argument types
// ============================================================================

/// Query and load pan-genome graphs.
#[derive(Parser, Debug)]
#[command(name = "prairie", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "PRAIRIE_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconstruct every sequence running from one k-mer to another.
    Query {
        /// Starting k-mer.
        src: String,

        /// Ending k-mer.
        dst: String,

        /// Store to query (memory, embedded, networked).
        #[arg(short, long)]
        backend: Option<Backend>,

        /// Overlap between consecutive k-mers.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Load one sample from tab-separated `header<TAB>k-mer` lines.
    Ingest {
        /// Sample name.
        sample: String,

        /// Input file.
        pairs: PathBuf,

        /// Store to load into (memory, embedded, networked).
        #[arg(short, long)]
        backend: Option<Backend>,

        /// Append RDF for `dgraph bulk` instead of writing to a store.
        #[arg(long, conflicts_with = "backend")]
        stage: bool,
    },

    /// Show graph statistics.
    Stats {
        /// Store to inspect (memory, embedded, networked).
        #[arg(short, long)]
        backend: Option<Backend>,
    },

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the effective configuration as TOML.
    Show,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_default() {
        let args = CliArgs::parse_from(["prairie"]);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_query_command() {
        let args = CliArgs::parse_from(["prairie", "query", "ACGTA", "CGTAC"]);
        match args.command {
            Some(Command::Query {
                src,
                dst,
                backend,
                overlap,
            }) => {
                assert_eq!(src, "ACGTA");
                assert_eq!(dst, "CGTAC");
                assert!(backend.is_none());
                assert!(overlap.is_none());
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_query_backend_and_overlap() {
        let args = CliArgs::parse_from([
            "prairie", "query", "A", "B", "--backend", "dgraph", "--overlap", "4",
        ]);
        match args.command {
            Some(Command::Query {
                backend, overlap, ..
            }) => {
                assert_eq!(backend, Some(Backend::Networked));
                assert_eq!(overlap, Some(4));
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = CliArgs::try_parse_from(["prairie", "stats", "--backend", "lemongraph"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ingest_command() {
        let args = CliArgs::parse_from(["prairie", "ingest", "s1", "s1.tsv", "--stage"]);
        match args.command {
            Some(Command::Ingest {
                sample,
                pairs,
                backend,
                stage,
            }) => {
                assert_eq!(sample, "s1");
                assert_eq!(pairs, PathBuf::from("s1.tsv"));
                assert!(backend.is_none());
                assert!(stage);
            }
            _ => panic!("Expected Ingest command"),
        }
    }

    #[test]
    fn test_ingest_stage_conflicts_with_backend() {
        let result = CliArgs::try_parse_from([
            "prairie", "ingest", "s1", "s1.tsv", "--stage", "--backend", "memory",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_commands() {
        let args = CliArgs::parse_from(["prairie", "config", "show"]);
        assert!(matches!(
            args.command,
            Some(Command::Config(ConfigCommand {
                command: ConfigAction::Show
            }))
        ));
        let args = CliArgs::parse_from(["prairie", "config", "path"]);
        assert!(matches!(
            args.command,
            Some(Command::Config(ConfigCommand {
                command: ConfigAction::Path
            }))
        ));
    }

    #[test]
    fn test_version_command() {
        let args = CliArgs::parse_from(["prairie", "version"]);
        assert!(matches!(args.command, Some(Command::Version)));
    }
}
