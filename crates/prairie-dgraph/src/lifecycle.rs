//! Starting and stopping a local Dgraph cluster for one graph instance.
//!
//! An instance is one coordinator (`dgraph zero`) and one worker
//! (`dgraph alpha`) sharing a working directory and a port offset:
//!
//! ```text
//! <work_dir>/
//!   p/            worker postings
//!   w/            coordinator WAL
//!   alpha/w/      worker WAL
//!   logs/         captured stdout/stderr per process
//! ```
//!
//! Start-up failures are fatal and carry the failed process's output.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use prairie_core::util::paths::find_executable;
use prairie_core::{Error, Result};
use prairie_graph::GraphStore;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};

use crate::ports::{BasePorts, PortAllocator, Ports};
use crate::store::{DgraphConfig, DgraphStore};

// ============================================================================
// Configuration
// ============================================================================

/// How to run a local instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Dgraph executable, bare name or path.
    pub binary: PathBuf,
    /// Working directory; a fresh temporary one when unset.
    pub work_dir: Option<PathBuf>,
    /// Clear the data and remove the working directory on teardown.
    pub delete: bool,
    /// Worker cache size in MB.
    pub lru_mb: u32,
    /// Wait after spawning the coordinator, in milliseconds.
    pub zero_settle_ms: u64,
    /// Wait after spawning the worker, in milliseconds.
    pub alpha_settle_ms: u64,
    /// Wait between stopping the worker and the coordinator, in milliseconds.
    pub stop_grace_ms: u64,
    /// Wait before the single schema retry, in milliseconds.
    pub schema_retry_ms: u64,
    /// Ports before the offset is applied.
    pub base_ports: BasePorts,
    /// Store settings; host and port are filled in from the instance.
    pub store: DgraphConfig,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("dgraph"),
            work_dir: None,
            delete: true,
            lru_mb: 2048,
            zero_settle_ms: 2000,
            alpha_settle_ms: 4000,
            stop_grace_ms: 2000,
            schema_retry_ms: 5000,
            base_ports: BasePorts::default(),
            store: DgraphConfig::default(),
        }
    }
}

// ============================================================================
// ServerProcess
// ============================================================================

/// A spawned server whose output goes to log files.
///
/// The child is killed if this value is dropped without [`stop`](Self::stop).
#[derive(Debug)]
pub struct ServerProcess {
    name: String,
    child: Option<Child>,
    stdout_log: PathBuf,
    stderr_log: PathBuf,
}

impl ServerProcess {
    /// Spawn `binary args...` in `cwd`, logging to `log_dir/<name>.{out,err}`.
    pub fn spawn(
        name: &str,
        binary: &Path,
        args: &[String],
        cwd: &Path,
        log_dir: &Path,
    ) -> Result<Self> {
        std::fs::create_dir_all(log_dir).map_err(|e| Error::io_with_path(e, log_dir))?;
        let stdout_log = log_dir.join(format!("{name}.out"));
        let stderr_log = log_dir.join(format!("{name}.err"));
        let stdout = File::create(&stdout_log).map_err(|e| Error::io_with_path(e, &stdout_log))?;
        let stderr = File::create(&stderr_log).map_err(|e| Error::io_with_path(e, &stderr_log))?;

        debug!("spawning {name}: {} {}", binary.display(), args.join(" "));
        let child = Command::new(binary)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::process(
                    format!("failed to spawn {name} ({}): {e}", binary.display()),
                    "",
                    "",
                )
            })?;

        Ok(Self {
            name: name.to_string(),
            child: Some(child),
            stdout_log,
            stderr_log,
        })
    }

    /// Process name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id while running.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Captured `(stdout, stderr)` so far.
    pub fn output(&self) -> (String, String) {
        let read = |path: &Path| std::fs::read_to_string(path).unwrap_or_default();
        (read(&self.stdout_log), read(&self.stderr_log))
    }

    fn exited(&self, status: ExitStatus) -> Error {
        let (stdout, stderr) = self.output();
        Error::process(format!("{} exited early with {status}", self.name), stdout, stderr)
    }

    /// Fail if the process has exited.
    pub fn ensure_alive(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Err(Error::process(format!("{} was stopped", self.name), "", ""));
        };
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(self.exited(status)),
            Err(e) => {
                let (stdout, stderr) = self.output();
                Err(Error::process(
                    format!("cannot poll {}: {e}", self.name),
                    stdout,
                    stderr,
                ))
            }
        }
    }

    /// Kill the process and reap it. Calling again does nothing.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            child.start_kill()?;
        }
        let status = child.wait().await?;
        debug!("{} stopped ({status})", self.name);
        Ok(())
    }
}

// ============================================================================
// DgraphInstance
// ============================================================================

/// A running coordinator/worker pair and a connected store.
#[derive(Debug)]
pub struct DgraphInstance {
    config: InstanceConfig,
    ports: Ports,
    work_dir: PathBuf,
    zero: Option<ServerProcess>,
    alpha: Option<ServerProcess>,
    store: DgraphStore,
    torn_down: bool,
}

fn make_dirs(work_dir: &Path) -> Result<()> {
    for dir in [
        work_dir.join("p"),
        work_dir.join("w"),
        work_dir.join("alpha").join("w"),
    ] {
        std::fs::create_dir_all(&dir).map_err(|e| Error::io_with_path(e, &dir))?;
    }
    Ok(())
}

/// Arguments for `dgraph zero`.
pub fn zero_args(ports: &Ports) -> Vec<String> {
    vec![
        "zero".into(),
        "-o".into(),
        ports.offset.to_string(),
        "--wal".into(),
        "w".into(),
    ]
}

/// Arguments for `dgraph alpha`.
pub fn alpha_args(ports: &Ports, lru_mb: u32) -> Vec<String> {
    vec![
        "alpha".into(),
        "--lru_mb".into(),
        lru_mb.to_string(),
        "--zero".into(),
        format!("localhost:{}", ports.zero_grpc),
        "-o".into(),
        ports.offset.to_string(),
        "--wal".into(),
        "alpha/w".into(),
        "--postings".into(),
        "p".into(),
    ]
}

async fn start_alpha(
    config: &InstanceConfig,
    binary: &Path,
    ports: &Ports,
    work_dir: &Path,
    log_dir: &Path,
) -> Result<ServerProcess> {
    let mut alpha = ServerProcess::spawn(
        "alpha",
        binary,
        &alpha_args(ports, config.lru_mb),
        work_dir,
        log_dir,
    )?;
    tokio::time::sleep(Duration::from_millis(config.alpha_settle_ms)).await;
    alpha.ensure_alive()?;
    Ok(alpha)
}

impl DgraphInstance {
    /// Claim an offset, start both servers, and connect a store.
    pub async fn start(config: InstanceConfig, allocator: &PortAllocator) -> Result<Self> {
        let binary = find_executable(&config.binary).ok_or_else(|| {
            Error::process(
                format!(
                    "dgraph executable '{}' not found on PATH",
                    config.binary.display()
                ),
                "",
                "",
            )
        })?;

        let offset = allocator.claim();
        let ports = config.base_ports.with_offset(offset)?;
        let work_dir = config.work_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("prairie-dgraph-{}-{offset}", std::process::id()))
        });
        make_dirs(&work_dir)?;
        let log_dir = work_dir.join("logs");
        info!(
            "starting dgraph in {} with port offset {offset}",
            work_dir.display()
        );

        let mut zero =
            ServerProcess::spawn("zero", &binary, &zero_args(&ports), &work_dir, &log_dir)?;
        tokio::time::sleep(Duration::from_millis(config.zero_settle_ms)).await;
        zero.ensure_alive()?;

        let mut alpha = match start_alpha(&config, &binary, &ports, &work_dir, &log_dir).await {
            Ok(alpha) => alpha,
            Err(e) => {
                if let Err(stop) = zero.stop().await {
                    warn!("failed to stop zero after alpha failed: {stop}");
                }
                return Err(e);
            }
        };

        let mut store = DgraphStore::new(DgraphConfig {
            host: "localhost".to_string(),
            http_port: ports.alpha_http,
            ..config.store.clone()
        })?;
        if let Err(e) = store.connect().await {
            warn!(
                "dgraph not ready ({e}); retrying schema in {} ms",
                config.schema_retry_ms
            );
            tokio::time::sleep(Duration::from_millis(config.schema_retry_ms)).await;
            alpha.ensure_alive()?;
            store.connect().await?;
        }

        Ok(Self {
            config,
            ports,
            work_dir,
            zero: Some(zero),
            alpha: Some(alpha),
            store,
            torn_down: false,
        })
    }

    /// The connected store.
    pub fn store(&self) -> &DgraphStore {
        &self.store
    }

    /// Ports in use.
    pub fn ports(&self) -> Ports {
        self.ports
    }

    /// Working directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Worker postings directory.
    pub fn postings_dir(&self) -> PathBuf {
        self.work_dir.join("p")
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stop both servers; clear data and remove the directory when `delete`
    /// is set. Safe to call more than once.
    pub async fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if self.config.delete
            && self.store.is_connected()
            && let Err(e) = self.store.clear().await
        {
            warn!("failed to clear dgraph before teardown: {e}");
        }
        self.store.disconnect();

        if let Some(mut alpha) = self.alpha.take()
            && let Err(e) = alpha.stop().await
        {
            warn!("failed to stop alpha: {e}");
        }
        tokio::time::sleep(Duration::from_millis(self.config.stop_grace_ms)).await;
        if let Some(mut zero) = self.zero.take()
            && let Err(e) = zero.stop().await
        {
            warn!("failed to stop zero: {e}");
        }

        if self.config.delete {
            info!("removing {}", self.work_dir.display());
            match std::fs::remove_dir_all(&self.work_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io_with_path(e, &self.work_dir)),
            }
        }
        Ok(())
    }
}
