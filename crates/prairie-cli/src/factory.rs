//! Store selection.
//!
//! Commands never inspect a store's concrete type; they ask this module for
//! a boxed [`GraphStore`] of the requested [`Backend`].

use std::path::PathBuf;

use log::info;
use prairie_core::Result;
use prairie_core::traits::ConfigProvider;
use prairie_dgraph::{DgraphConfig, DgraphStore};
use prairie_graph::{Backend, EmbeddedStore, GraphStore, MemoryStore};

use crate::config::PrairieConfig;

/// Configuration the store factory needs beyond paths.
pub trait StoreConfig: ConfigProvider {
    /// Backend used when a command does not name one.
    fn default_backend(&self) -> Backend;

    /// Overlap between consecutive k-mers when reassembling.
    fn overlap(&self) -> usize;

    /// Networked store settings.
    fn dgraph(&self) -> &DgraphConfig;
}

impl StoreConfig for PrairieConfig {
    fn default_backend(&self) -> Backend {
        self.graph.backend
    }

    fn overlap(&self) -> usize {
        PrairieConfig::overlap(self)
    }

    fn dgraph(&self) -> &DgraphConfig {
        &self.dgraph
    }
}

/// Open (and for the networked backend, connect) a store.
pub async fn open_store<C: StoreConfig>(
    config: &C,
    backend: Backend,
) -> Result<Box<dyn GraphStore>> {
    match backend {
        Backend::Memory => {
            let snapshot = config.store_path("snapshot")?;
            if snapshot.exists() {
                info!("loading snapshot {}", snapshot.display());
                Ok(Box::new(MemoryStore::load(&snapshot)?))
            } else {
                Ok(Box::new(MemoryStore::new()))
            }
        }
        Backend::Embedded => {
            let path = config.store_path("embedded")?;
            info!("opening {}", path.display());
            Ok(Box::new(EmbeddedStore::open(&path)?))
        }
        Backend::Networked => {
            let mut store = DgraphStore::new(config.dgraph().clone())?;
            store.connect().await?;
            Ok(Box::new(store))
        }
    }
}

/// Where `save` should write after a command modified `backend`.
pub fn save_handle<C: StoreConfig>(config: &C, backend: Backend) -> Result<Option<PathBuf>> {
    match backend {
        Backend::Memory => Ok(Some(config.store_path("snapshot")?)),
        Backend::Embedded | Backend::Networked => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prairie_graph::{Edge, Node};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> PrairieConfig {
        PrairieConfig {
            base_path: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_memory_without_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&config_in(&dir), Backend::Memory).await.unwrap();
        assert_eq!(store.backend(), Backend::Memory);
        assert_eq!(store.node_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let store = open_store(&config, Backend::Memory).await.unwrap();
        store
            .upsert_edge(Edge::new("A", "B").with_origin("t", 0), false)
            .await
            .unwrap();
        let handle = save_handle(&config, Backend::Memory).unwrap();
        store.save(handle.as_deref()).await.unwrap();

        let reopened = open_store(&config, Backend::Memory).await.unwrap();
        assert_eq!(reopened.edge_count().await.unwrap(), 1);
        assert!(reopened.exists_node(&Node::new("B")).await.unwrap().0);
    }

    #[tokio::test]
    async fn test_open_embedded() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        {
            let store = open_store(&config, Backend::Embedded).await.unwrap();
            assert_eq!(store.backend(), Backend::Embedded);
            store.upsert_node(Node::new("ACGT"), false).await.unwrap();
        }
        assert!(dir.path().join("pangenome.redb").exists());
        assert_eq!(save_handle(&config, Backend::Embedded).unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_networked_without_server_fails() {
        let mut config = PrairieConfig::default();
        config.dgraph.host = "127.0.0.1".into();
        config.dgraph.http_port = 9;
        config.dgraph.timeout_secs = 2;
        assert!(open_store(&config, Backend::Networked).await.is_err());
    }
}
