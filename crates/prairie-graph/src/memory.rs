//! In-memory store backed by a petgraph `DiGraph`.
//!
//! All state lives behind one `RwLock`, so check-then-create is atomic.
//! Nothing is durable unless [`GraphStore::save`] is given a path, which
//! writes a JSON snapshot that [`MemoryStore::load`] can read back.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use log::debug;
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use prairie_core::Result;
use tokio::sync::RwLock;

use crate::persistence::{GraphSnapshot, SnapshotMetadata, load_snapshot, save_snapshot};
use crate::store::{Backend, GraphStore};
use crate::types::{DEFAULT_NODE_TYPE, Edge, Node};

type NodeKey = (String, String);
type EdgeKey = (String, String, String, u64);

fn node_key(node: &Node) -> NodeKey {
    (node.node_type.clone(), node.value.clone())
}

fn edge_key(edge: &Edge) -> EdgeKey {
    (
        edge.src.clone(),
        edge.tgt.clone(),
        edge.edge_type.clone(),
        edge.edge_value,
    )
}

#[derive(Default)]
struct GraphData {
    graph: DiGraph<Node, Edge>,
    node_indices: HashMap<NodeKey, NodeIndex>,
    edge_indices: HashMap<EdgeKey, EdgeIndex>,
}

impl GraphData {
    fn upsert_node(&mut self, mut node: Node) -> NodeIndex {
        let key = node_key(&node);
        if let Some(&idx) = self.node_indices.get(&key) {
            return idx;
        }
        node.db_id = None;
        let idx = self.graph.add_node(node);
        self.graph[idx].db_id = Some(idx.index().to_string());
        self.node_indices.insert(key, idx);
        idx
    }

    fn upsert_edge(&mut self, mut edge: Edge) -> EdgeIndex {
        let key = edge_key(&edge);
        if let Some(&idx) = self.edge_indices.get(&key) {
            return idx;
        }
        let src = self.upsert_node(edge.src_node());
        let tgt = self.upsert_node(edge.tgt_node());
        edge.db_id = None;
        let idx = self.graph.add_edge(src, tgt, edge);
        self.graph[idx].db_id = Some(idx.index().to_string());
        self.edge_indices.insert(key, idx);
        idx
    }

    fn index_of(&self, value: &str) -> Option<NodeIndex> {
        self.node_indices
            .get(&(DEFAULT_NODE_TYPE.to_string(), value.to_string()))
            .copied()
    }

    fn adjacent(&self, value: &str, direction: Direction) -> Vec<Edge> {
        let Some(idx) = self.index_of(value) else {
            return Vec::new();
        };
        let mut found: Vec<(EdgeIndex, Edge)> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| (e.id(), e.weight().clone()))
            .collect();
        found.sort_by_key(|(id, _)| *id);
        found.into_iter().map(|(_, e)| e).collect()
    }

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self.graph.edge_weights().cloned().collect(),
            metadata: Some(SnapshotMetadata::default()),
        }
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Process-local graph store.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<GraphData>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_snapshot(load_snapshot(path)?))
    }

    /// Rebuild a store from an in-memory snapshot.
    ///
    /// Identifiers are reassigned; edges are replayed in their saved order.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut data = GraphData::default();
        for node in snapshot.nodes {
            data.upsert_node(node);
        }
        for edge in snapshot.edges {
            data.upsert_edge(edge);
        }
        Self {
            data: RwLock::new(data),
        }
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    async fn upsert_node(&self, node: Node, echo: bool) -> Result<Option<Node>> {
        let mut data = self.data.write().await;
        let idx = data.upsert_node(node);
        Ok(echo.then(|| data.graph[idx].clone()))
    }

    async fn upsert_edge(&self, edge: Edge, echo: bool) -> Result<Option<Edge>> {
        let mut data = self.data.write().await;
        let idx = data.upsert_edge(edge);
        Ok(echo.then(|| data.graph[idx].clone()))
    }

    async fn exists_node(&self, node: &Node) -> Result<(bool, Option<String>)> {
        let data = self.data.read().await;
        Ok(match data.node_indices.get(&node_key(node)) {
            Some(idx) => (true, Some(idx.index().to_string())),
            None => (false, None),
        })
    }

    async fn exists_edge(&self, edge: &Edge) -> Result<(bool, Option<String>)> {
        let data = self.data.read().await;
        Ok(match data.edge_indices.get(&edge_key(edge)) {
            Some(idx) => (true, Some(idx.index().to_string())),
            None => (false, None),
        })
    }

    async fn get_node(&self, value: &str) -> Result<Option<Node>> {
        let data = self.data.read().await;
        Ok(data.index_of(value).map(|idx| data.graph[idx].clone()))
    }

    async fn find_edges(&self, value: &str) -> Result<Vec<Edge>> {
        Ok(self.data.read().await.adjacent(value, Direction::Outgoing))
    }

    async fn find_edges_reverse(&self, value: &str) -> Result<Vec<Edge>> {
        Ok(self.data.read().await.adjacent(value, Direction::Incoming))
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        Ok(self.data.read().await.graph.node_weights().cloned().collect())
    }

    async fn edges(&self) -> Result<Vec<Edge>> {
        Ok(self.data.read().await.graph.edge_weights().cloned().collect())
    }

    async fn node_count(&self) -> Result<usize> {
        Ok(self.data.read().await.graph.node_count())
    }

    async fn edge_count(&self) -> Result<usize> {
        Ok(self.data.read().await.graph.edge_count())
    }

    async fn clear(&self) -> Result<()> {
        *self.data.write().await = GraphData::default();
        Ok(())
    }

    async fn save(&self, handle: Option<&Path>) -> Result<()> {
        let Some(path) = handle else {
            return Ok(());
        };
        let snapshot = self.data.read().await.snapshot();
        debug!(
            "saving {} nodes and {} edges to {}",
            snapshot.nodes.len(),
            snapshot.edges.len(),
            path.display()
        );
        save_snapshot(&snapshot, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_conformance() {
        conformance::run_all(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_db_id_is_index() {
        let store = MemoryStore::new();
        let a = store.upsert_node(Node::new("A"), true).await.unwrap().unwrap();
        let b = store.upsert_node(Node::new("B"), true).await.unwrap().unwrap();
        assert_eq!(a.db_id.as_deref(), Some("0"));
        assert_eq!(b.db_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_save_without_handle_is_noop() {
        let store = MemoryStore::new();
        store.upsert_node(Node::new("A"), false).await.unwrap();
        store.save(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let store = MemoryStore::new();
        store
            .upsert_edge(Edge::new("A", "B").with_origin("t", 0), false)
            .await
            .unwrap();
        store
            .upsert_edge(Edge::new("B", "C").with_origin("t", 1), false)
            .await
            .unwrap();
        store.save(Some(&path)).await.unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.node_count().await.unwrap(), 3);
        assert_eq!(loaded.edge_count().await.unwrap(), 2);

        let paths = loaded.path("A", "C").await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].values(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_do_not_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .upsert_edge(Edge::new("A", "B").with_origin("t", 0), false)
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(store.node_count().await.unwrap(), 2);
        assert_eq!(store.edge_count().await.unwrap(), 1);
    }
}
