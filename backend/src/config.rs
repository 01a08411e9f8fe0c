//! Pipeline configuration file support.
//!
//! Configuration is read from a TOML file (`pipeline.toml`) and every field has a
//! default, so an empty file, or no file at all, yields a working local setup. A few
//! deployment-specific values can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::db::repository::RepositoryError;
use crate::solver::{ContainerRunner, LocalRunner, ProcessRunner, SolverInvoker, SolverOptions};
use crate::storage::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub repository: RepositorySettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Repository type settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(rename = "type", default = "default_repo_type")]
    pub repo_type: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            repo_type: default_repo_type(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_artifact_root")]
    pub root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            root: default_artifact_root(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverTarget {
    Container,
    Local,
}

/// Where and how the external solver runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_solver_target")]
    pub target: SolverTarget,
    /// Name of the long-running solver container.
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_input_root")]
    pub input_root: String,
    #[serde(default = "default_output_root")]
    pub output_root: String,
    /// Scratch directory for the local runner.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_html_level")]
    pub html_level: u8,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_true")]
    pub export_csv: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            target: default_solver_target(),
            container: default_container(),
            binary: default_binary(),
            input_root: default_input_root(),
            output_root: default_output_root(),
            work_root: default_work_root(),
            timeout_secs: default_timeout_secs(),
            html_level: default_html_level(),
            verbose: false,
            export_csv: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Fallback polling interval; submissions wake the worker immediately.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_repo_type() -> String {
    "local".to_string()
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_solver_target() -> SolverTarget {
    SolverTarget::Container
}

fn default_container() -> String {
    "fet".to_string()
}

fn default_binary() -> String {
    "fet-cl".to_string()
}

fn default_input_root() -> String {
    "/timetables".to_string()
}

fn default_output_root() -> String {
    "/output".to_string()
}

fn default_work_root() -> PathBuf {
    PathBuf::from("./solver-work")
}

fn default_timeout_secs() -> u64 {
    crate::solver::DEFAULT_TIMEOUT.as_secs()
}

fn default_html_level() -> u8 {
    7
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!("Failed to read config file: {}", e))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, RepositoryError> {
        toml::from_str(content).map_err(|e| {
            RepositoryError::configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `pipeline.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, RepositoryError> {
        match Self::default_location() {
            Some(path) => Self::from_file(path),
            None => Err(RepositoryError::configuration(
                "No pipeline.toml found in standard locations",
            )),
        }
    }

    fn default_location() -> Option<PathBuf> {
        [
            PathBuf::from("pipeline.toml"),
            PathBuf::from("backend/pipeline.toml"),
            PathBuf::from("../pipeline.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// The default-location file if present, else built-in defaults; then environment
    /// overrides.
    pub fn load() -> Result<Self, RepositoryError> {
        let mut config = match Self::default_location() {
            Some(path) => Self::from_file(path)?,
            None => {
                log::info!("No pipeline.toml found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `HOST`, `PORT`, `SOLVER_CONTAINER`, `SOLVER_TIMEOUT_SECS` and `ARTIFACT_ROOT`.
    ///
    /// The lookup is injected so tests do not touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), RepositoryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| {
                RepositoryError::configuration(format!("Invalid PORT value: {}", port))
            })?;
        }
        if let Some(container) = lookup("SOLVER_CONTAINER") {
            self.solver.container = container;
        }
        if let Some(secs) = lookup("SOLVER_TIMEOUT_SECS") {
            self.solver.timeout_secs = secs.parse().map_err(|_| {
                RepositoryError::configuration(format!(
                    "Invalid SOLVER_TIMEOUT_SECS value: {}",
                    secs
                ))
            })?;
        }
        if let Some(root) = lookup("ARTIFACT_ROOT") {
            self.storage.root = PathBuf::from(root);
            self.storage.backend = StorageBackend::Filesystem;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker.poll_interval_secs.max(1))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            html_level: self.solver.html_level,
            verbose: self.solver.verbose,
            export_csv: self.solver.export_csv,
            timeout: Duration::from_secs(self.solver.timeout_secs),
        }
    }

    pub fn build_store(&self) -> Arc<dyn ArtifactStore> {
        match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryArtifactStore::new()),
            StorageBackend::Filesystem => Arc::new(FsArtifactStore::new(&self.storage.root)),
        }
    }

    pub fn build_runner(&self) -> Arc<dyn ProcessRunner> {
        let s = &self.solver;
        match s.target {
            SolverTarget::Container => Arc::new(ContainerRunner::new(
                &s.container,
                &s.binary,
                &s.input_root,
                &s.output_root,
            )),
            SolverTarget::Local => Arc::new(LocalRunner::new(&s.binary, &s.work_root)),
        }
    }

    pub fn build_invoker(&self) -> SolverInvoker {
        SolverInvoker::new(self.build_runner(), self.solver_options())
    }
}
