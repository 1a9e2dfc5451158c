//! Embedded transactional store backed by redb.
//!
//! Every logical write (one node or one edge upsert) runs in its own write
//! transaction. redb admits a single writer at a time, so the existence
//! check and the insert it guards are atomic. Reads use MVCC snapshots and
//! never block writers.
//!
//! Records are JSON-encoded; adjacency is kept in two composite-key tables
//! scanned by range, which returns edges in insertion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use prairie_core::{Error, Result};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::{Backend, GraphStore};
use crate::types::{DEFAULT_NODE_TYPE, Edge, Node};

// ============================================================================
// Tables
// ============================================================================

/// `(node_type, value) -> node id`
const NODES: TableDefinition<(&str, &str), u64> = TableDefinition::new("nodes");

/// `node id -> JSON node`
const NODE_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("node_records");

/// `(src, tgt, edge_type, edge_value) -> edge id`
const EDGES: TableDefinition<(&str, &str, &str, u64), u64> = TableDefinition::new("edges");

/// `edge id -> JSON edge`
const EDGE_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("edge_records");

/// `(src value, edge id) -> edge id`
const OUTGOING: TableDefinition<(&str, u64), u64> = TableDefinition::new("outgoing");

/// `(tgt value, edge id) -> edge id`
const INCOMING: TableDefinition<(&str, u64), u64> = TableDefinition::new("incoming");

/// Id sequences.
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const NODE_SEQ: &str = "node";
const EDGE_SEQ: &str = "edge";

fn storage<E: Into<redb::Error>>(e: E) -> Error {
    Error::backend(format!("embedded store: {}", e.into()))
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| Error::serialization(e.to_string()))
}

fn decode<T, Tbl>(table: &Tbl, id: u64) -> Result<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id).map_err(storage)? {
        Some(bytes) => serde_json::from_slice(bytes.value())
            .map(Some)
            .map_err(|e| Error::invalid_data(format!("corrupt record {id}: {e}"))),
        None => Ok(None),
    }
}

fn create_tables(txn: &WriteTransaction) -> Result<()> {
    txn.open_table(NODES).map_err(storage)?;
    txn.open_table(NODE_RECORDS).map_err(storage)?;
    txn.open_table(EDGES).map_err(storage)?;
    txn.open_table(EDGE_RECORDS).map_err(storage)?;
    txn.open_table(OUTGOING).map_err(storage)?;
    txn.open_table(INCOMING).map_err(storage)?;
    txn.open_table(COUNTERS).map_err(storage)?;
    Ok(())
}

fn next_id(txn: &WriteTransaction, seq: &str) -> Result<u64> {
    let mut counters = txn.open_table(COUNTERS).map_err(storage)?;
    let next = counters
        .get(seq)
        .map_err(storage)?
        .map(|v| v.value())
        .unwrap_or(0);
    counters.insert(seq, next + 1).map_err(storage)?;
    Ok(next)
}

fn upsert_node_in(txn: &WriteTransaction, node: &Node) -> Result<Node> {
    let key = (node.node_type.as_str(), node.value.as_str());
    let existing = {
        let index = txn.open_table(NODES).map_err(storage)?;
        index.get(key).map_err(storage)?.map(|v| v.value())
    };

    if let Some(id) = existing {
        let records = txn.open_table(NODE_RECORDS).map_err(storage)?;
        return decode(&records, id)?
            .ok_or_else(|| Error::invalid_data(format!("node {id} indexed but not stored")));
    }

    let id = next_id(txn, NODE_SEQ)?;
    let mut stored = node.clone();
    stored.db_id = Some(id.to_string());
    let bytes = encode(&stored)?;

    txn.open_table(NODE_RECORDS)
        .map_err(storage)?
        .insert(id, bytes.as_slice())
        .map_err(storage)?;
    txn.open_table(NODES)
        .map_err(storage)?
        .insert(key, id)
        .map_err(storage)?;
    Ok(stored)
}

fn upsert_edge_in(txn: &WriteTransaction, edge: &Edge) -> Result<Edge> {
    let key = (
        edge.src.as_str(),
        edge.tgt.as_str(),
        edge.edge_type.as_str(),
        edge.edge_value,
    );
    let existing = {
        let index = txn.open_table(EDGES).map_err(storage)?;
        index.get(key).map_err(storage)?.map(|v| v.value())
    };

    if let Some(id) = existing {
        let records = txn.open_table(EDGE_RECORDS).map_err(storage)?;
        return decode(&records, id)?
            .ok_or_else(|| Error::invalid_data(format!("edge {id} indexed but not stored")));
    }

    upsert_node_in(txn, &edge.src_node())?;
    upsert_node_in(txn, &edge.tgt_node())?;

    let id = next_id(txn, EDGE_SEQ)?;
    let mut stored = edge.clone();
    stored.db_id = Some(id.to_string());
    let bytes = encode(&stored)?;

    txn.open_table(EDGE_RECORDS)
        .map_err(storage)?
        .insert(id, bytes.as_slice())
        .map_err(storage)?;
    txn.open_table(EDGES)
        .map_err(storage)?
        .insert(key, id)
        .map_err(storage)?;
    txn.open_table(OUTGOING)
        .map_err(storage)?
        .insert((edge.src.as_str(), id), id)
        .map_err(storage)?;
    txn.open_table(INCOMING)
        .map_err(storage)?
        .insert((edge.tgt.as_str(), id), id)
        .map_err(storage)?;
    Ok(stored)
}

fn adjacent(
    db: &Database,
    direction: TableDefinition<'static, (&'static str, u64), u64>,
    value: &str,
) -> Result<Vec<Edge>> {
    let txn = db.begin_read().map_err(storage)?;
    let index = txn.open_table(direction).map_err(storage)?;
    let records = txn.open_table(EDGE_RECORDS).map_err(storage)?;

    let mut edges = Vec::new();
    for entry in index
        .range((value, 0u64)..=(value, u64::MAX))
        .map_err(storage)?
    {
        let (_, id) = entry.map_err(storage)?;
        if let Some(edge) = decode(&records, id.value())? {
            edges.push(edge);
        }
    }
    Ok(edges)
}

fn all_records<T: DeserializeOwned>(
    db: &Database,
    table: TableDefinition<'static, u64, &'static [u8]>,
) -> Result<Vec<T>> {
    let txn = db.begin_read().map_err(storage)?;
    let records = txn.open_table(table).map_err(storage)?;
    let mut out = Vec::new();
    for entry in records.iter().map_err(storage)? {
        let (id, bytes) = entry.map_err(storage)?;
        let record = serde_json::from_slice(bytes.value()).map_err(|e| {
            Error::invalid_data(format!("corrupt record {}: {e}", id.value()))
        })?;
        out.push(record);
    }
    Ok(out)
}

fn record_count(
    db: &Database,
    table: TableDefinition<'static, u64, &'static [u8]>,
) -> Result<usize> {
    let txn = db.begin_read().map_err(storage)?;
    let records = txn.open_table(table).map_err(storage)?;
    let len = records.len().map_err(storage)?;
    usize::try_from(len).map_err(|e| Error::backend(format!("record count overflow: {e}")))
}

// ============================================================================
// EmbeddedStore
// ============================================================================

/// Graph store persisted in a single redb file.
pub struct EmbeddedStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EmbeddedStore {
    /// Open the database at `path`, creating it and its parent directory
    /// if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }

        let db = Database::create(&path).map_err(storage)?;
        let txn = db.begin_write().map_err(storage)?;
        create_tables(&txn)?;
        txn.commit().map_err(storage)?;

        info!("opened embedded store at {}", path.display());
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Location of the database file.
    pub fn db_path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| Error::backend(format!("embedded store task failed: {e}")))?
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&WriteTransaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(storage)?;
            let out = f(&txn)?;
            txn.commit().map_err(storage)?;
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl GraphStore for EmbeddedStore {
    fn backend(&self) -> Backend {
        Backend::Embedded
    }

    async fn upsert_node(&self, node: Node, echo: bool) -> Result<Option<Node>> {
        let stored = self.write(move |txn| upsert_node_in(txn, &node)).await?;
        Ok(echo.then_some(stored))
    }

    async fn upsert_edge(&self, edge: Edge, echo: bool) -> Result<Option<Edge>> {
        let stored = self.write(move |txn| upsert_edge_in(txn, &edge)).await?;
        Ok(echo.then_some(stored))
    }

    async fn exists_node(&self, node: &Node) -> Result<(bool, Option<String>)> {
        let node_type = node.node_type.clone();
        let value = node.value.clone();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(storage)?;
            let index = txn.open_table(NODES).map_err(storage)?;
            let found = index
                .get((node_type.as_str(), value.as_str()))
                .map_err(storage)?
                .map(|v| v.value());
            Ok((found.is_some(), found.map(|id| id.to_string())))
        })
        .await
    }

    async fn exists_edge(&self, edge: &Edge) -> Result<(bool, Option<String>)> {
        let edge = edge.clone();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(storage)?;
            let index = txn.open_table(EDGES).map_err(storage)?;
            let key = (
                edge.src.as_str(),
                edge.tgt.as_str(),
                edge.edge_type.as_str(),
                edge.edge_value,
            );
            let found = index.get(key).map_err(storage)?.map(|v| v.value());
            Ok((found.is_some(), found.map(|id| id.to_string())))
        })
        .await
    }

    async fn get_node(&self, value: &str) -> Result<Option<Node>> {
        let value = value.to_string();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(storage)?;
            let index = txn.open_table(NODES).map_err(storage)?;
            let Some(id) = index
                .get((DEFAULT_NODE_TYPE, value.as_str()))
                .map_err(storage)?
                .map(|v| v.value())
            else {
                return Ok(None);
            };
            let records = txn.open_table(NODE_RECORDS).map_err(storage)?;
            decode(&records, id)
        })
        .await
    }

    async fn find_edges(&self, value: &str) -> Result<Vec<Edge>> {
        let value = value.to_string();
        self.blocking(move |db| adjacent(db, OUTGOING, &value)).await
    }

    async fn find_edges_reverse(&self, value: &str) -> Result<Vec<Edge>> {
        let value = value.to_string();
        self.blocking(move |db| adjacent(db, INCOMING, &value)).await
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        self.blocking(|db| all_records(db, NODE_RECORDS)).await
    }

    async fn edges(&self) -> Result<Vec<Edge>> {
        self.blocking(|db| all_records(db, EDGE_RECORDS)).await
    }

    async fn node_count(&self) -> Result<usize> {
        self.blocking(|db| record_count(db, NODE_RECORDS)).await
    }

    async fn edge_count(&self) -> Result<usize> {
        self.blocking(|db| record_count(db, EDGE_RECORDS)).await
    }

    async fn clear(&self) -> Result<()> {
        self.write(|txn| {
            txn.delete_table(NODES).map_err(storage)?;
            txn.delete_table(NODE_RECORDS).map_err(storage)?;
            txn.delete_table(EDGES).map_err(storage)?;
            txn.delete_table(EDGE_RECORDS).map_err(storage)?;
            txn.delete_table(OUTGOING).map_err(storage)?;
            txn.delete_table(INCOMING).map_err(storage)?;
            txn.delete_table(COUNTERS).map_err(storage)?;
            create_tables(txn)
        })
        .await?;
        debug!("cleared embedded store at {}", self.path.display());
        Ok(())
    }

    async fn save(&self, _handle: Option<&Path>) -> Result<()> {
        // Every upsert has already committed.
        Ok(())
    }
}
