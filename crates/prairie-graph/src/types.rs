//! Core graph types: nodes, edges, and their origins.
//!
//! These are plain value types shared by every backend. A [`Node`] is a
//! k-mer (or any opaque string) scoped by a node type; an [`Edge`] joins
//! two node values and records which lineage produced it and where.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Node type used when none is given.
pub const DEFAULT_NODE_TYPE: &str = "n";

/// Lineage name used when none is given.
pub const DEFAULT_EDGE_TYPE: &str = "e";

/// Auxiliary string attributes attached to nodes and edges.
pub type Labels = BTreeMap<String, String>;

// ============================================================================
// Node
// ============================================================================

/// A vertex in the pan-genome graph.
///
/// Identity is `(node_type, value)`; `db_id` and `labels` do not take part
/// in equality checks performed by stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Opaque key, usually a k-mer.
    pub value: String,
    /// Namespace tag.
    pub node_type: String,
    /// Backend-assigned identifier, set after an upsert or read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,
    /// Auxiliary attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

impl Node {
    /// Create a node of the default type.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            node_type: DEFAULT_NODE_TYPE.to_string(),
            db_id: None,
            labels: Labels::new(),
        }
    }

    /// Set the node type.
    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    /// Attach a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the backend identifier.
    pub fn with_db_id(mut self, db_id: impl Into<String>) -> Self {
        self.db_id = Some(db_id.into());
        self
    }

    /// Whether two nodes denote the same vertex.
    pub fn same_identity(&self, other: &Node) -> bool {
        self.node_type == other.node_type && self.value == other.value
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_type, self.value)?;
        if let Some(id) = &self.db_id {
            write!(f, " #{id}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Origin
// ============================================================================

/// Position of an edge within its lineage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Origin {
    /// The lineage.
    pub edge_type: String,
    /// Ordinal within the lineage, starting at 0.
    pub edge_value: u64,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.edge_type, self.edge_value)
    }
}

// ============================================================================
// Edge
// ============================================================================

/// A directed adjacency between two node values, stamped with its origin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node value.
    pub src: String,
    /// Target node value.
    pub tgt: String,
    /// Lineage that produced this adjacency.
    pub edge_type: String,
    /// Ordinal of this edge within its lineage.
    pub edge_value: u64,
    /// Auxiliary attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    /// Backend-assigned identifier, set once persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,
}

impl Edge {
    /// Create an edge of the default lineage at ordinal 0.
    pub fn new(src: impl Into<String>, tgt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
            edge_type: DEFAULT_EDGE_TYPE.to_string(),
            edge_value: 0,
            labels: Labels::new(),
            db_id: None,
        }
    }

    /// Set the lineage and ordinal.
    pub fn with_origin(mut self, edge_type: impl Into<String>, edge_value: u64) -> Self {
        self.edge_type = edge_type.into();
        self.edge_value = edge_value;
        self
    }

    /// Attach a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the backend identifier.
    pub fn with_db_id(mut self, db_id: impl Into<String>) -> Self {
        self.db_id = Some(db_id.into());
        self
    }

    /// The `(edge_type, edge_value)` pair.
    pub fn origin(&self) -> Origin {
        Origin {
            edge_type: self.edge_type.clone(),
            edge_value: self.edge_value,
        }
    }

    /// Whether two edges denote the same persisted adjacency.
    ///
    /// Identity is `(src, tgt, edge_type, edge_value)`.
    pub fn same_identity(&self, other: &Edge) -> bool {
        self.src == other.src
            && self.tgt == other.tgt
            && self.edge_type == other.edge_type
            && self.edge_value == other.edge_value
    }

    /// Source endpoint as a default-typed node.
    pub fn src_node(&self) -> Node {
        Node::new(self.src.clone())
    }

    /// Target endpoint as a default-typed node.
    pub fn tgt_node(&self) -> Node {
        Node::new(self.tgt.clone())
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{}@{}]-> {}",
            self.src, self.edge_type, self.edge_value, self.tgt
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
