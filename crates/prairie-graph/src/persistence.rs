//! JSON snapshots of a graph.
//!
//! The in-memory store has no durable state of its own; a snapshot written
//! by [`save_snapshot`] captures every node and edge so the graph can be
//! rebuilt later with [`load_snapshot`].

use std::path::Path;

use prairie_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Edge, Node};

// ============================================================================
// Snapshot types
// ============================================================================

/// Serializable form of a whole graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// All nodes.
    pub nodes: Vec<Node>,
    /// All edges, in insertion order.
    pub edges: Vec<Edge>,
    /// Provenance of the snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnapshotMetadata>,
}

/// Provenance recorded alongside a snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Unix timestamp of the save.
    pub saved_at: String,
    /// Version of the crate that wrote it.
    pub writer_version: String,
}

impl Default for SnapshotMetadata {
    fn default() -> Self {
        Self {
            saved_at: timestamp_now(),
            writer_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_secs().to_string()
}

// ============================================================================
// Save / Load
// ============================================================================

/// Write a snapshot as pretty-printed JSON.
pub fn save_snapshot(snapshot: &GraphSnapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| Error::serialization(format!("failed to serialize graph: {e}")))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }
    std::fs::write(path, json).map_err(|e| Error::io_with_path(e, path))
}

/// Read a snapshot from a JSON file.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<GraphSnapshot> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    load_snapshot_from_str(&json)
}

/// Parse a snapshot from a JSON string.
pub fn load_snapshot_from_str(json: &str) -> Result<GraphSnapshot> {
    serde_json::from_str(json)
        .map_err(|e| Error::invalid_data(format!("failed to parse graph JSON: {e}")))
}
