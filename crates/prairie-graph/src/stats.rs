//! Graph statistics.
//!
//! Summaries computed from the full node and edge listings of a store.

use std::collections::{BTreeMap, HashMap};

use prairie_core::Result;
use serde::{Deserialize, Serialize};

use crate::lineage::uncouple_edge_type;
use crate::store::GraphStore;
use crate::types::Edge;

// ============================================================================
// Types
// ============================================================================

/// Composition of a graph instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of nodes.
    pub node_count: usize,
    /// Total number of edges.
    pub edge_count: usize,
    /// Edges per lineage.
    pub lineage_distribution: BTreeMap<String, usize>,
    /// Lineages per sample, for lineages named `sample::contig`.
    pub sample_distribution: BTreeMap<String, usize>,
    /// Nodes without any edges.
    pub orphan_count: usize,
    /// Highest number of outgoing edges on one node.
    pub max_out_degree: usize,
    /// Node with the highest out-degree.
    pub busiest_node: Option<String>,
}

impl GraphStats {
    /// Number of distinct lineages.
    pub fn lineage_count(&self) -> usize {
        self.lineage_distribution.len()
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Compute statistics for everything in `store`.
pub async fn compute_stats(store: &dyn GraphStore) -> Result<GraphStats> {
    let nodes = store.nodes().await?;
    let edges = store.edges().await?;

    let mut stats = summarize_edges(&edges);
    stats.node_count = nodes.len();
    stats.orphan_count = nodes
        .iter()
        .filter(|n| !edges.iter().any(|e| e.src == n.value || e.tgt == n.value))
        .count();
    Ok(stats)
}

fn summarize_edges(edges: &[Edge]) -> GraphStats {
    let mut lineage_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut out_degrees: HashMap<&str, usize> = HashMap::new();

    for edge in edges {
        *lineage_distribution.entry(edge.edge_type.clone()).or_insert(0) += 1;
        *out_degrees.entry(edge.src.as_str()).or_insert(0) += 1;
    }

    let mut sample_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for lineage in lineage_distribution.keys() {
        if let Some((sample, _)) = uncouple_edge_type(lineage) {
            *sample_distribution.entry(sample.to_string()).or_insert(0) += 1;
        }
    }

    let (busiest_node, max_out_degree) = out_degrees
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, &v)| (Some((*k).to_string()), v))
        .unwrap_or((None, 0));

    GraphStats {
        node_count: 0,
        edge_count: edges.len(),
        lineage_distribution,
        sample_distribution,
        orphan_count: 0,
        max_out_degree,
        busiest_node,
    }
}

/// One-line size summary.
pub fn quick_summary(stats: &GraphStats) -> String {
    format!(
        "{} nodes, {} edges, {} lineages",
        stats.node_count,
        stats.edge_count,
        stats.lineage_count()
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::Node;

    async fn create_test_store() -> MemoryStore {
        let store = MemoryStore::new();
        for edge in [
            Edge::new("A", "B").with_origin("s1::c1", 0),
            Edge::new("B", "C").with_origin("s1::c1", 1),
            Edge::new("A", "D").with_origin("s1::c2", 0),
            Edge::new("A", "B").with_origin("s2::c1", 0),
        ] {
            store.upsert_edge(edge, false).await.unwrap();
        }
        store.upsert_node(Node::new("LONELY"), false).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_compute_stats() {
        let store = create_test_store().await;
        let stats = compute_stats(&store).await.unwrap();

        assert_eq!(stats.node_count, 5);
        assert_eq!(stats.edge_count, 4);
        assert_eq!(stats.lineage_count(), 3);
        assert_eq!(stats.lineage_distribution["s1::c1"], 2);
        assert_eq!(stats.sample_distribution["s1"], 2);
        assert_eq!(stats.sample_distribution["s2"], 1);
        assert_eq!(stats.orphan_count, 1);
        assert_eq!(stats.max_out_degree, 3);
        assert_eq!(stats.busiest_node.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let stats = compute_stats(&MemoryStore::new()).await.unwrap();
        assert_eq!(stats, GraphStats::default());
        assert_eq!(quick_summary(&stats), "0 nodes, 0 edges, 0 lineages");
    }
}
