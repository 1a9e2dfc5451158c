//! Error types for Prairie operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all Prairie crates. Uses `thiserror` for derive macros.
//!
//! # Taxonomy
//!
//! | Variant | Meaning | Retried? |
//! |---|---|---|
//! | [`Error::Transport`] | network round trip to a store failed | yes, see [`Error::is_transient`] |
//! | [`Error::Backend`] | the store answered with an error, or retries ran out | no |
//! | [`Error::Process`] | a server process failed to start or died | no |
//! | [`Error::GraphConsistency`] | the graph contradicts an asserted invariant | no |
//! | [`Error::Precondition`] | API misuse, e.g. querying before `connect()` | no |
//!
//! "Not found" is deliberately absent: lookups return `(false, None)` or an
//! empty collection instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur in Prairie operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transient transport failure talking to a networked store.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-transient failure reported by (or about) a backing store.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A managed server process failed to start or exited early.
    #[error("Process error: {message}")]
    Process {
        /// What went wrong.
        message: String,
        /// Captured standard output of the process.
        stdout: String,
        /// Captured standard error of the process.
        stderr: String,
    },

    /// The graph contradicts an invariant that a prior query asserted.
    #[error(
        "Graph consistency violation: {message} ({} nodes, {} edges dumped)",
        nodes.len(),
        edges.len()
    )]
    GraphConsistency {
        /// What was expected.
        message: String,
        /// Rendered nodes of the graph at the time of failure.
        nodes: Vec<String>,
        /// Rendered edges of the graph at the time of failure.
        edges: Vec<String>,
    },

    /// Programmer error: an operation was called in the wrong state.
    #[error("Precondition violated: {0}")]
    Precondition(String),
}

impl Error {
    /// Create an I/O error carrying the offending path.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a process error with the captured output of the process.
    pub fn process(
        msg: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Process {
            message: msg.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a graph consistency error carrying a dump of the graph.
    pub fn graph_consistency(
        msg: impl Into<String>,
        nodes: Vec<String>,
        edges: Vec<String>,
    ) -> Self {
        Self::GraphConsistency {
            message: msg.into(),
            nodes,
            edges,
        }
    }

    /// Create a precondition error.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// Only transport failures are transient; everything else is fatal
    /// for the operation that produced it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias using Prairie's Error type.
pub type Result<T> = std::result::Result<T, Error>;
