//! Graph store backed by a Dgraph cluster.
//!
//! Nodes are `<node_type> "value"` subjects; edges are edge nodes written by
//! [`crate::rdf`]. Writes go through the [`MutationRetrier`], reads are
//! single `/query` round trips decoded by [`crate::dql`].
//!
//! Check-then-create is serialized within this process by striped per-key
//! locks. Across processes the `@upsert` directive on node predicates makes
//! Dgraph abort the losing commit of a duplicate node; duplicate edge nodes
//! from concurrent writers in different processes are not prevented.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use prairie_core::{Error, Result};
use prairie_graph::{Backend, ChainRequest, DEFAULT_NODE_TYPE, Edge, GraphStore, Node};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::client::DgraphClient;
use crate::dql;
use crate::rdf::{
    self, EDGE_PREDICATE, LABELS_PREDICATE, LINEAGE_PREDICATE, ORDINAL_PREDICATE, RdfBlock,
    Subject, TARGET_PREDICATE,
};
use crate::retry::MutationRetrier;

const LOCK_STRIPES: usize = 64;

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for a Dgraph worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DgraphConfig {
    /// Worker host.
    pub host: String,
    /// Worker HTTP port.
    pub http_port: u16,
    /// Node types the schema indexes; must include the default type.
    pub node_types: Vec<String>,
    /// Total attempts per mutation.
    pub max_attempts: u32,
    /// Backoff unit in milliseconds.
    pub retry_unit_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DgraphConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            http_port: 8080,
            node_types: vec![DEFAULT_NODE_TYPE.to_string()],
            max_attempts: 3,
            retry_unit_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl DgraphConfig {
    /// Reject settings that cannot produce a valid schema.
    pub fn validate(&self) -> Result<()> {
        if self.node_types.is_empty() {
            return Err(Error::config("dgraph.node_types must not be empty"));
        }
        if !self.node_types.iter().any(|t| t == DEFAULT_NODE_TYPE) {
            return Err(Error::config(format!(
                "dgraph.node_types must include the default type '{DEFAULT_NODE_TYPE}'"
            )));
        }
        for node_type in &self.node_types {
            rdf::check_predicate(node_type).map_err(|e| Error::config(e.to_string()))?;
        }
        Ok(())
    }

    /// Schema for the configured node types and the edge-node predicates.
    pub fn schema(&self) -> String {
        let mut schema: String = self
            .node_types
            .iter()
            .map(|t| format!("{t}: string @index(exact) @upsert .\n"))
            .collect();
        schema.push_str(&format!("{LABELS_PREDICATE}: string .\n"));
        schema.push_str(&format!("{LINEAGE_PREDICATE}: string @index(exact) .\n"));
        schema.push_str(&format!("{ORDINAL_PREDICATE}: int @index(int) .\n"));
        schema.push_str(&format!("{EDGE_PREDICATE}: [uid] @reverse .\n"));
        schema.push_str(&format!("{TARGET_PREDICATE}: uid @reverse .\n"));
        schema
    }

    fn retrier(&self) -> MutationRetrier {
        MutationRetrier::new()
            .with_max_attempts(self.max_attempts)
            .with_unit(Duration::from_millis(self.retry_unit_ms))
    }
}

// ============================================================================
// DgraphStore
// ============================================================================

/// [`GraphStore`] over a Dgraph worker's HTTP API.
///
/// Must be [`connect`](Self::connect)ed before use.
pub struct DgraphStore {
    config: DgraphConfig,
    retrier: MutationRetrier,
    client: Option<DgraphClient>,
    node_locks: Vec<Mutex<()>>,
    edge_locks: Vec<Mutex<()>>,
}

impl std::fmt::Debug for DgraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DgraphStore")
            .field("host", &self.config.host)
            .field("http_port", &self.config.http_port)
            .field("connected", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

fn stripes() -> Vec<Mutex<()>> {
    (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect()
}

fn stripe_of<K: Hash>(key: &K) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % LOCK_STRIPES as u64) as usize
}

impl DgraphStore {
    /// Create an unconnected store.
    pub fn new(config: DgraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            retrier: config.retrier(),
            config,
            client: None,
            node_locks: stripes(),
            edge_locks: stripes(),
        })
    }

    /// Open the HTTP client, probe the worker, and apply the schema.
    pub async fn connect(&mut self) -> Result<()> {
        let client = DgraphClient::new(
            &self.config.host,
            self.config.http_port,
            Duration::from_secs(self.config.timeout_secs),
        )?;
        client.health().await?;
        client.alter(&self.config.schema()).await?;
        info!("connected to dgraph at {}", client.base_url());
        self.client = Some(client);
        Ok(())
    }

    /// Drop the client. Later calls fail until reconnected.
    pub fn disconnect(&mut self) {
        if self.client.take().is_some() {
            debug!("disconnected from dgraph");
        }
    }

    /// Whether [`connect`](Self::connect) has succeeded.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Active configuration.
    pub fn config(&self) -> &DgraphConfig {
        &self.config
    }

    /// Re-apply the schema.
    pub async fn apply_schema(&self) -> Result<()> {
        self.client()?.alter(&self.config.schema()).await
    }

    fn client(&self) -> Result<&DgraphClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::precondition("dgraph store used before connect()"))
    }

    fn check_node_type(&self, node_type: &str) -> Result<()> {
        if self.config.node_types.iter().any(|t| t == node_type) {
            Ok(())
        } else {
            Err(Error::invalid_data(format!(
                "node type '{node_type}' is not in the schema ({})",
                self.config.node_types.join(", ")
            )))
        }
    }

    async fn fetch_node(&self, node_type: &str, value: &str) -> Result<Option<Node>> {
        self.check_node_type(node_type)?;
        let query = dql::with_value(dql::node_by_value(node_type), value);
        let data = self.client()?.query(&query).await?;
        dql::decode_node_lookup(&data, node_type)
    }

    async fn fetch_edge(&self, edge: &Edge) -> Result<Option<Edge>> {
        let query = dql::edge_by_identity(DEFAULT_NODE_TYPE, edge);
        let data = self.client()?.query(&query).await?;
        dql::decode_edge_lookup(&data, edge)
    }

    /// Upsert a node and return it with its uid.
    async fn ensure_node(&self, node: Node) -> Result<Node> {
        self.check_node_type(&node.node_type)?;
        let stripe = stripe_of(&(&node.node_type, &node.value));
        let _guard = self.node_locks[stripe].lock().await;

        if let Some(existing) = self.fetch_node(&node.node_type, &node.value).await? {
            return Ok(existing);
        }

        let subject = Subject::node(&node.node_type, &node.value);
        let mut block = RdfBlock::new();
        block.node(&subject, &node)?;
        let outcome = self.retrier.run(self.client()?, &block.nquads()).await?;

        let uid = subject
            .label()
            .and_then(|label| outcome.mutation.uid(label))
            .ok_or_else(|| Error::backend(format!("no uid assigned to node {}", node.value)))?;
        Ok(node.with_db_id(uid))
    }

    async fn total(&self, predicate: &str) -> Result<usize> {
        let data = self.client()?.query(&dql::count(predicate)).await?;
        dql::decode_count(&data)
    }
}

#[async_trait]
impl GraphStore for DgraphStore {
    fn backend(&self) -> Backend {
        Backend::Networked
    }

    async fn upsert_node(&self, node: Node, echo: bool) -> Result<Option<Node>> {
        let stored = self.ensure_node(node).await?;
        Ok(echo.then_some(stored))
    }

    async fn upsert_edge(&self, edge: Edge, echo: bool) -> Result<Option<Edge>> {
        let stripe = stripe_of(&(&edge.src, &edge.tgt, &edge.edge_type, edge.edge_value));
        let _guard = self.edge_locks[stripe].lock().await;

        if let Some(stored) = self.fetch_edge(&edge).await? {
            return Ok(echo.then_some(stored));
        }

        let src = self.ensure_node(edge.src_node()).await?;
        let tgt = self.ensure_node(edge.tgt_node()).await?;
        let (Some(src_uid), Some(tgt_uid)) = (src.db_id, tgt.db_id) else {
            return Err(Error::backend("endpoint upsert returned no uid"));
        };

        let edge_node = Subject::edge(&edge);
        let mut block = RdfBlock::new();
        block.edge(
            &Subject::Uid(src_uid),
            &edge_node,
            &Subject::Uid(tgt_uid),
            &edge,
        )?;
        let outcome = self.retrier.run(self.client()?, &block.nquads()).await?;
        debug!("upserted edge {edge} in {} attempt(s)", outcome.attempts);

        let uid = edge_node
            .label()
            .and_then(|label| outcome.mutation.uid(label))
            .map(str::to_string);
        Ok(echo.then(|| Edge { db_id: uid, ..edge }))
    }

    async fn exists_node(&self, node: &Node) -> Result<(bool, Option<String>)> {
        if self.check_node_type(&node.node_type).is_err() {
            return Ok((false, None));
        }
        let found = self.fetch_node(&node.node_type, &node.value).await?;
        Ok(match found.and_then(|n| n.db_id) {
            Some(uid) => (true, Some(uid)),
            None => (false, None),
        })
    }

    async fn exists_edge(&self, edge: &Edge) -> Result<(bool, Option<String>)> {
        Ok(match self.fetch_edge(edge).await?.and_then(|e| e.db_id) {
            Some(uid) => (true, Some(uid)),
            None => (false, None),
        })
    }

    async fn get_node(&self, value: &str) -> Result<Option<Node>> {
        self.fetch_node(DEFAULT_NODE_TYPE, value).await
    }

    async fn find_edges(&self, value: &str) -> Result<Vec<Edge>> {
        let query = dql::with_value(dql::outgoing(DEFAULT_NODE_TYPE), value);
        let data = self.client()?.query(&query).await?;
        dql::decode_outgoing(&data)
    }

    async fn find_edges_reverse(&self, value: &str) -> Result<Vec<Edge>> {
        let query = dql::with_value(dql::incoming(DEFAULT_NODE_TYPE), value);
        let data = self.client()?.query(&query).await?;
        dql::decode_incoming(&data)
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for node_type in &self.config.node_types {
            let data = self.client()?.query(&dql::all_nodes(node_type)).await?;
            nodes.extend(dql::decode_nodes(&data, node_type)?);
        }
        Ok(nodes)
    }

    async fn edges(&self) -> Result<Vec<Edge>> {
        let data = self
            .client()?
            .query(&dql::all_edges(DEFAULT_NODE_TYPE))
            .await?;
        dql::decode_edges(&data)
    }

    async fn node_count(&self) -> Result<usize> {
        let mut total = 0;
        for node_type in &self.config.node_types {
            total += self.total(node_type).await?;
        }
        Ok(total)
    }

    async fn edge_count(&self) -> Result<usize> {
        self.total(LINEAGE_PREDICATE).await
    }

    async fn chain(&self, start: &str, request: &ChainRequest) -> Result<Vec<Vec<Node>>> {
        let query = dql::with_value(dql::chain(DEFAULT_NODE_TYPE, request), start);
        let data = self.client()?.query(&query).await?;
        dql::decode_chain(&data, DEFAULT_NODE_TYPE, request)
    }

    async fn clear(&self) -> Result<()> {
        let client = self.client()?;
        client.drop_all().await?;
        client.alter(&self.config.schema()).await
    }

    async fn save(&self, _handle: Option<&Path>) -> Result<()> {
        // Every mutation has already committed.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_every_node_type() {
        let config = DgraphConfig {
            node_types: vec!["n".into(), "contig".into()],
            ..DgraphConfig::default()
        };
        let schema = config.schema();
        assert!(schema.contains("n: string @index(exact) @upsert ."));
        assert!(schema.contains("contig: string @index(exact) @upsert ."));
        assert!(schema.contains("lineage: string @index(exact) ."));
        assert!(schema.contains("ordinal: int @index(int) ."));
        assert!(schema.contains("e: [uid] @reverse ."));
        assert!(schema.contains("tgt: uid @reverse ."));
    }

    #[test]
    fn test_validate_rejects_bad_types() {
        let missing_default = DgraphConfig {
            node_types: vec!["contig".into()],
            ..DgraphConfig::default()
        };
        assert!(matches!(
            DgraphStore::new(missing_default).unwrap_err(),
            Error::Config(_)
        ));

        let bad_name = DgraphConfig {
            node_types: vec!["n".into(), "has space".into()],
            ..DgraphConfig::default()
        };
        assert!(DgraphStore::new(bad_name).is_err());
    }

    #[tokio::test]
    async fn test_use_before_connect_is_precondition_error() {
        let store = DgraphStore::new(DgraphConfig::default()).unwrap();
        assert!(!store.is_connected());

        let err = store.find_edges("ABC").await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)), "got {err:?}");

        let err = store.upsert_node(Node::new("ABC"), true).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)), "got {err:?}");

        let err = store.clear().await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unknown_node_type_rejected() {
        let store = DgraphStore::new(DgraphConfig::default()).unwrap();
        let err = store
            .upsert_node(Node::new("A").with_type("contig"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)), "got {err:?}");

        let (found, _) = store
            .exists_node(&Node::new("A").with_type("contig"))
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_connect_to_missing_server_fails() {
        let mut store = DgraphStore::new(DgraphConfig {
            host: "127.0.0.1".into(),
            http_port: 9,
            timeout_secs: 2,
            ..DgraphConfig::default()
        })
        .unwrap();
        assert!(store.connect().await.is_err());
        assert!(!store.is_connected());
        store.disconnect();
    }

    #[test]
    fn test_stripes_are_stable() {
        let key = ("n", "ACG");
        assert_eq!(stripe_of(&key), stripe_of(&key));
        assert!(stripe_of(&key) < LOCK_STRIPES);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: DgraphConfig = serde_json::from_str(r#"{"http_port": 8081}"#).unwrap();
        assert_eq!(config.http_port, 8081);
        assert_eq!(config.node_types, vec!["n"]);
        assert_eq!(config.max_attempts, 3);
    }
}
