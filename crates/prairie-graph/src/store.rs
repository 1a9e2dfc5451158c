//! The store contract every backend implements.
//!
//! [`GraphStore`] is deliberately small: point upserts and lookups, the two
//! adjacency primitives [`find_edges`](GraphStore::find_edges) and
//! [`find_edges_reverse`](GraphStore::find_edges_reverse), and full listings
//! for diagnosis. Connectivity and path reconstruction are provided methods
//! built on those primitives, so a backend gets them for free.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use prairie_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Edge, Labels, Node};
use crate::{connectivity, path};

// ============================================================================
// Backend
// ============================================================================

/// Which kind of store backs a graph instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process petgraph store.
    #[default]
    Memory,
    /// Embedded transactional store on local disk.
    Embedded,
    /// Networked Dgraph cluster.
    Networked,
}

impl Backend {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Embedded => "embedded",
            Self::Networked => "networked",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" | "petgraph" => Ok(Self::Memory),
            "embedded" | "redb" => Ok(Self::Embedded),
            "networked" | "dgraph" => Ok(Self::Networked),
            other => Err(Error::config(format!(
                "unknown backend '{other}' (expected memory, embedded or networked)"
            ))),
        }
    }
}

// ============================================================================
// Query results
// ============================================================================

/// Outcome of a connectivity check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    /// Distinct outgoing edges of the source that begin a lineage-consistent
    /// walk to the target, in first-seen order.
    pub starting_edges: Vec<Edge>,
}

impl Connectivity {
    /// Whether at least one lineage connects source and target.
    pub fn connected(&self) -> bool {
        !self.starting_edges.is_empty()
    }
}

/// One reconstructed walk between two nodes, attributed to its lineage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineagePath {
    /// Nodes from source to target, inclusive.
    pub nodes: Vec<Node>,
    /// Lineage the walk follows.
    pub edge_type: String,
    /// Labels carried by the walk's starting edge.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
}

impl LineagePath {
    /// Node values in walk order.
    pub fn values(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.value.as_str()).collect()
    }

    /// Number of nodes in the walk.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the walk has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A bounded walk request: follow exactly the edges of `edge_type` with
/// ordinals `first..=last`, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainRequest {
    /// Lineage to follow.
    pub edge_type: String,
    /// Ordinal of the first edge.
    pub first: u64,
    /// Ordinal of the last edge.
    pub last: u64,
}

impl ChainRequest {
    /// Number of edges the walk follows.
    pub fn hops(&self) -> u64 {
        self.last.saturating_sub(self.first) + 1
    }
}

// ============================================================================
// GraphStore
// ============================================================================

/// Persistence and query contract for a pan-genome graph instance.
///
/// Implementations must be safe to share across tasks. Lookups never treat
/// "not found" as an error: they return `(false, None)` or an empty vector.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Which backend this is.
    fn backend(&self) -> Backend;

    /// Create the node unless `(node_type, value)` exists.
    ///
    /// Returns the canonical stored node (with `db_id`) when `echo` is set.
    async fn upsert_node(&self, node: Node, echo: bool) -> Result<Option<Node>>;

    /// Upsert both endpoints, then create the edge unless
    /// `(src, tgt, edge_type, edge_value)` exists.
    async fn upsert_edge(&self, edge: Edge, echo: bool) -> Result<Option<Edge>>;

    /// Point lookup by `(node_type, value)`.
    async fn exists_node(&self, node: &Node) -> Result<(bool, Option<String>)>;

    /// Point lookup by `(src, tgt, edge_type, edge_value)`.
    async fn exists_edge(&self, edge: &Edge) -> Result<(bool, Option<String>)>;

    /// Canonical default-typed node with this value.
    async fn get_node(&self, value: &str) -> Result<Option<Node>>;

    /// Outgoing edges of the node with this value.
    async fn find_edges(&self, value: &str) -> Result<Vec<Edge>>;

    /// Incoming edges of the node with this value.
    async fn find_edges_reverse(&self, value: &str) -> Result<Vec<Edge>>;

    /// Every stored node.
    async fn nodes(&self) -> Result<Vec<Node>>;

    /// Every stored edge.
    async fn edges(&self) -> Result<Vec<Edge>>;

    /// Number of stored nodes.
    async fn node_count(&self) -> Result<usize> {
        Ok(self.nodes().await?.len())
    }

    /// Number of stored edges.
    async fn edge_count(&self) -> Result<usize> {
        Ok(self.edges().await?.len())
    }

    /// Walk `request` from `start`, returning every node sequence that
    /// satisfies it. Ordinals are unique per lineage, so at most one chain
    /// is found by this default walk.
    async fn chain(&self, start: &str, request: &ChainRequest) -> Result<Vec<Vec<Node>>> {
        let mut nodes = vec![self.materialize(start).await?];
        let mut current = start.to_string();

        for ordinal in request.first..=request.last {
            let next = self
                .find_edges(&current)
                .await?
                .into_iter()
                .find(|e| e.edge_type == request.edge_type && e.edge_value == ordinal);

            let Some(edge) = next else {
                return Ok(Vec::new());
            };
            nodes.push(self.materialize(&edge.tgt).await?);
            current = edge.tgt;
        }

        Ok(vec![nodes])
    }

    /// Whether some lineage walks from `a` to `b`.
    async fn connected(&self, a: &str, b: &str) -> Result<Connectivity> {
        connectivity::resolve(self, a, b).await
    }

    /// One reconstructed walk per lineage-consistent edge pair.
    async fn path(&self, a: &str, b: &str) -> Result<Vec<LineagePath>> {
        path::reconstruct(self, a, b).await
    }

    /// Remove all persisted state.
    async fn clear(&self) -> Result<()>;

    /// Flush to durable storage; see each backend for what `handle` means.
    async fn save(&self, handle: Option<&Path>) -> Result<()>;

    /// Stored node for `value`, or a bare default-typed node if absent.
    async fn materialize(&self, value: &str) -> Result<Node> {
        Ok(self
            .get_node(value)
            .await?
            .unwrap_or_else(|| Node::new(value)))
    }
}
