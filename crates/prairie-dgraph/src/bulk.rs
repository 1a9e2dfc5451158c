//! Offline loading: stage triples to `.rdf` files, then run `dgraph bulk`.
//!
//! [`RdfStager`] is a [`GraphStore`] that answers reads from an in-memory
//! mirror and records every newly created node and edge as blank-labelled
//! triples. `save(Some(path))` appends the pending triples to `path`.
//!
//! [`BulkLoader`] runs the bulk loader against a coordinator and moves the
//! resulting postings into place; [`bulk_load`] wires both into a running
//! [`DgraphInstance`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, info, warn};
use prairie_core::util::paths::find_executable;
use prairie_core::{Error, Result};
use prairie_graph::{Backend, DEFAULT_NODE_TYPE, Edge, GraphStore, MemoryStore, Node};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::lifecycle::{DgraphInstance, InstanceConfig};
use crate::ports::PortAllocator;
use crate::rdf::{RdfBlock, Subject};

// ============================================================================
// RdfStager
// ============================================================================

/// Write-behind staging of triples for the bulk loader.
///
/// Node and edge ids are those of the in-memory mirror, not Dgraph uids.
#[derive(Default)]
pub struct RdfStager {
    mirror: MemoryStore,
    pending: Mutex<RdfBlock>,
}

impl RdfStager {
    /// Empty stager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triples waiting for the next [`save`](GraphStore::save).
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn stage_endpoint(&self, pending: &mut RdfBlock, value: &str) -> Result<()> {
        let node = Node::new(value);
        if !self.mirror.exists_node(&node).await?.0 {
            pending.node(&Subject::node(DEFAULT_NODE_TYPE, value), &node)?;
            self.mirror.upsert_node(node, false).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for RdfStager {
    fn backend(&self) -> Backend {
        Backend::Networked
    }

    async fn upsert_node(&self, node: Node, echo: bool) -> Result<Option<Node>> {
        let mut pending = self.pending.lock().await;
        if !self.mirror.exists_node(&node).await?.0 {
            pending.node(&Subject::node(&node.node_type, &node.value), &node)?;
        }
        self.mirror.upsert_node(node, echo).await
    }

    async fn upsert_edge(&self, edge: Edge, echo: bool) -> Result<Option<Edge>> {
        let mut pending = self.pending.lock().await;
        self.stage_endpoint(&mut pending, &edge.src).await?;
        self.stage_endpoint(&mut pending, &edge.tgt).await?;
        if !self.mirror.exists_edge(&edge).await?.0 {
            pending.edge(
                &Subject::node(DEFAULT_NODE_TYPE, &edge.src),
                &Subject::edge(&edge),
                &Subject::node(DEFAULT_NODE_TYPE, &edge.tgt),
                &edge,
            )?;
        }
        self.mirror.upsert_edge(edge, echo).await
    }

    async fn exists_node(&self, node: &Node) -> Result<(bool, Option<String>)> {
        self.mirror.exists_node(node).await
    }

    async fn exists_edge(&self, edge: &Edge) -> Result<(bool, Option<String>)> {
        self.mirror.exists_edge(edge).await
    }

    async fn get_node(&self, value: &str) -> Result<Option<Node>> {
        self.mirror.get_node(value).await
    }

    async fn find_edges(&self, value: &str) -> Result<Vec<Edge>> {
        self.mirror.find_edges(value).await
    }

    async fn find_edges_reverse(&self, value: &str) -> Result<Vec<Edge>> {
        self.mirror.find_edges_reverse(value).await
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        self.mirror.nodes().await
    }

    async fn edges(&self) -> Result<Vec<Edge>> {
        self.mirror.edges().await
    }

    async fn clear(&self) -> Result<()> {
        let mut pending = self.pending.lock().await;
        pending.take();
        self.mirror.clear().await
    }

    /// Append pending triples to `handle`. Without a handle they stay pending.
    async fn save(&self, handle: Option<&Path>) -> Result<()> {
        let Some(path) = handle else {
            debug!("no rdf file given; keeping staged triples");
            return Ok(());
        };
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(e, parent))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| Error::io_with_path(e, path))?;
        file.write_all(pending.nquads().as_bytes())
            .await
            .map_err(|e| Error::io_with_path(e, path))?;
        file.flush().await.map_err(|e| Error::io_with_path(e, path))?;

        debug!("appended {} triples to {}", pending.len(), path.display());
        pending.take();
        Ok(())
    }
}

// ============================================================================
// BulkLoader
// ============================================================================

/// One `dgraph bulk` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkLoader {
    /// Dgraph executable.
    pub binary: PathBuf,
    /// RDF file or directory of RDF files.
    pub rdfs: PathBuf,
    /// Schema file.
    pub schema: PathBuf,
    /// Map/reduce parallelism.
    pub processes: usize,
    /// Coordinator gRPC port.
    pub zero_port: u16,
    /// Address of the loader's own status endpoint.
    pub http: String,
}

impl BulkLoader {
    /// Loader for `rdfs` using every available CPU.
    pub fn new(rdfs: impl Into<PathBuf>, schema: impl Into<PathBuf>, zero_port: u16) -> Self {
        let processes = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1);
        Self {
            binary: PathBuf::from("dgraph"),
            rdfs: rdfs.into(),
            schema: schema.into(),
            processes,
            zero_port,
            http: "localhost:8001".to_string(),
        }
    }

    /// Use a different executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Override the parallelism (at least 1).
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes.max(1);
        self
    }

    /// Command-line arguments after the executable.
    pub fn args(&self) -> Vec<String> {
        vec![
            "bulk".into(),
            "-f".into(),
            self.rdfs.display().to_string(),
            "-s".into(),
            self.schema.display().to_string(),
            "-j".into(),
            self.processes.to_string(),
            "--map_shards=1".into(),
            "--reduce_shards=1".into(),
            "--http".into(),
            self.http.clone(),
            format!("--zero=localhost:{}", self.zero_port),
        ]
    }

    /// Run in `cwd` and move `cwd/out/0/p` to `postings`.
    pub async fn run(&self, cwd: &Path, postings: &Path) -> Result<PathBuf> {
        let binary = find_executable(&self.binary).ok_or_else(|| {
            Error::process(
                format!("bulk loader '{}' not found on PATH", self.binary.display()),
                "",
                "",
            )
        })?;

        info!("running dgraph bulk on {}", self.rdfs.display());
        let output = Command::new(&binary)
            .args(self.args())
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::process(format!("failed to spawn dgraph bulk: {e}"), "", ""))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(Error::process(
                format!("dgraph bulk failed with {}", output.status),
                stdout,
                stderr,
            ));
        }

        let produced = cwd.join("out").join("0").join("p");
        if !produced.is_dir() {
            return Err(Error::process(
                format!("dgraph bulk produced no postings at {}", produced.display()),
                stdout,
                stderr,
            ));
        }
        move_dir(&produced, postings)?;
        info!("postings moved to {}", postings.display());
        Ok(postings.to_path_buf())
    }
}

/// Move a directory, copying when a rename cannot cross filesystems.
fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_dir_all(to).map_err(|e| Error::io_with_path(e, to))?;
    }
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_dir(from, to)?;
    std::fs::remove_dir_all(from).map_err(|e| Error::io_with_path(e, from))
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| Error::io_with_path(e, to))?;
    for entry in std::fs::read_dir(from).map_err(|e| Error::io_with_path(e, from))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| Error::io_with_path(e, &target))?;
        }
    }
    Ok(())
}

// ============================================================================
// bulk_load
// ============================================================================

/// The load result wins over a cleanup failure, which is only logged then.
fn load_then_cleanup<T>(loaded: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (loaded, cleanup) {
        (Err(e), Err(cleanup)) => {
            warn!("staging teardown also failed: {cleanup}");
            Err(e)
        }
        (loaded, cleanup) => {
            let value = loaded?;
            cleanup?;
            Ok(value)
        }
    }
}

/// Bulk-load `rdfs` and return an instance serving the result from
/// `final_dir`.
///
/// The loader needs a live coordinator, so a throwaway instance is started
/// first; the servers cannot be restarted in the directory they loaded into,
/// hence the second instance in `final_dir`.
pub async fn bulk_load(
    rdfs: &Path,
    final_dir: &Path,
    config: InstanceConfig,
    allocator: &PortAllocator,
) -> Result<DgraphInstance> {
    info!("loading rdf from {} ...", rdfs.display());
    let mut staging = DgraphInstance::start(
        InstanceConfig {
            work_dir: None,
            delete: false,
            ..config.clone()
        },
        allocator,
    )
    .await?;

    let schema_path = staging.work_dir().join("schema.txt");
    let loaded = match std::fs::write(&schema_path, config.store.schema()) {
        Ok(()) => {
            BulkLoader::new(rdfs, &schema_path, staging.ports().zero_grpc)
                .with_binary(&config.binary)
                .run(staging.work_dir(), &final_dir.join("p"))
                .await
        }
        Err(e) => Err(Error::io_with_path(e, &schema_path)),
    };

    let torn_down = staging.teardown().await;
    if let Err(e) = std::fs::remove_dir_all(staging.work_dir()) {
        warn!(
            "failed to remove staging directory {}: {e}",
            staging.work_dir().display()
        );
    }
    load_then_cleanup(loaded, torn_down)?;

    DgraphInstance::start(
        InstanceConfig {
            work_dir: Some(final_dir.to_path_buf()),
            ..config
        },
        allocator,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stager_records_new_triples_once() {
        let stager = RdfStager::new();
        stager.upsert_node(Node::new("AAA"), false).await.unwrap();
        stager.upsert_node(Node::new("AAA"), false).await.unwrap();
        assert_eq!(stager.pending().await, 1);

        let edge = Edge::new("AAA", "AAC").with_origin("s1::c1", 0);
        stager.upsert_edge(edge.clone(), false).await.unwrap();
        // new target node + four edge triples
        assert_eq!(stager.pending().await, 6);
        stager.upsert_edge(edge, false).await.unwrap();
        assert_eq!(stager.pending().await, 6);
    }

    #[tokio::test]
    async fn test_stager_concurrent_duplicates_staged_once() {
        let stager = RdfStager::new();
        let upserts = (0..16).map(|_| stager.upsert_node(Node::new("GATTACA"), false));
        for result in futures::future::join_all(upserts).await {
            result.unwrap();
        }
        assert_eq!(stager.pending().await, 1);
        assert_eq!(stager.node_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stager_answers_reads() {
        let stager = RdfStager::new();
        stager
            .upsert_edge(Edge::new("A", "B").with_origin("t", 0), false)
            .await
            .unwrap();
        stager
            .upsert_edge(Edge::new("B", "C").with_origin("t", 1), false)
            .await
            .unwrap();

        assert!(stager.connected("A", "C").await.unwrap().connected());
        let paths = stager.path("A", "C").await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].values(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_stager_save_appends() {
        let dir = tempdir().unwrap();
        let rdf = dir.path().join("rdf").join("sample.rdf");
        let stager = RdfStager::new();

        stager.save(Some(&rdf)).await.unwrap();
        assert!(!rdf.exists(), "nothing pending, nothing written");

        stager.upsert_node(Node::new("AAA"), false).await.unwrap();
        stager.save(Some(&rdf)).await.unwrap();
        assert_eq!(stager.pending().await, 0);

        stager.upsert_node(Node::new("CCC"), false).await.unwrap();
        stager.save(None).await.unwrap();
        assert_eq!(stager.pending().await, 1);
        stager.save(Some(&rdf)).await.unwrap();

        let text = std::fs::read_to_string(&rdf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("_:n_AAA <n> \"AAA\""));
        assert!(lines[1].starts_with("_:n_CCC <n> \"CCC\""));
    }

    #[tokio::test]
    async fn test_stager_clear_drops_pending() {
        let stager = RdfStager::new();
        stager
            .upsert_edge(Edge::new("A", "B").with_origin("t", 0), false)
            .await
            .unwrap();
        stager.clear().await.unwrap();
        assert_eq!(stager.pending().await, 0);
        assert_eq!(stager.node_count().await.unwrap(), 0);
    }

    #[test]
    fn test_bulk_args() {
        let loader = BulkLoader::new("/data/rdf", "/data/schema.txt", 5081).with_processes(4);
        assert_eq!(
            loader.args(),
            vec![
                "bulk",
                "-f",
                "/data/rdf",
                "-s",
                "/data/schema.txt",
                "-j",
                "4",
                "--map_shards=1",
                "--reduce_shards=1",
                "--http",
                "localhost:8001",
                "--zero=localhost:5081",
            ]
        );
        assert_eq!(loader.with_processes(0).processes, 1);
    }

    // `sh bulk ...` runs the `bulk` script in the working directory.
    #[cfg(unix)]
    fn fake_loader(cwd: &Path, script: &str) -> BulkLoader {
        std::fs::write(cwd.join("bulk"), script).unwrap();
        BulkLoader::new("rdf", "schema.txt", 5080).with_binary("/bin/sh")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_moves_postings() {
        let cwd = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let postings = dest.path().join("dgraph").join("p");
        let loader = fake_loader(
            cwd.path(),
            "mkdir -p out/0/p && echo sst > out/0/p/000001.sst\n",
        );

        let moved = loader.run(cwd.path(), &postings).await.unwrap();
        assert_eq!(moved, postings);
        assert!(postings.join("000001.sst").is_file());
        assert!(!cwd.path().join("out").join("0").join("p").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failure_carries_output() {
        let cwd = tempdir().unwrap();
        let loader = fake_loader(cwd.path(), "echo mapping; echo 'zero unreachable' >&2; exit 1\n");

        match loader.run(cwd.path(), &cwd.path().join("p")).await {
            Err(Error::Process { stdout, stderr, .. }) => {
                assert!(stdout.contains("mapping"));
                assert!(stderr.contains("zero unreachable"));
            }
            other => panic!("expected process error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_error_wins_over_cleanup_error() {
        let err = load_then_cleanup::<()>(
            Err(Error::process("bulk failed", "", "reduce error")),
            Err(Error::backend("teardown failed")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Process { .. }), "got {err:?}");

        let err = load_then_cleanup(Ok(1), Err(Error::backend("teardown failed"))).unwrap_err();
        assert!(err.to_string().contains("teardown failed"));
        assert_eq!(load_then_cleanup(Ok(1), Ok(())).unwrap(), 1);
    }

    #[test]
    fn test_copy_dir() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("a").join("b")).unwrap();
        std::fs::write(src.path().join("a").join("b").join("f"), "x").unwrap();

        let target = dst.path().join("copy");
        copy_dir(src.path(), &target).unwrap();
        assert_eq!(
            std::fs::read_to_string(target.join("a").join("b").join("f")).unwrap(),
            "x"
        );
    }
}
