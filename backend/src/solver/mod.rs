//! External solver invocation.
//!
//! The solver is a singleton, resource-heavy command line program. How it is reached
//! (a long-running container, a local binary) is hidden behind [`ProcessRunner`]; the
//! [`SolverInvoker`] drives one run through a runner: stage the input, execute with a
//! hard ceiling, collect every produced file, and always clean up.

pub mod container;
pub mod invoker;
pub mod local;

use async_trait::async_trait;
use std::time::Duration;

pub use container::ContainerRunner;
pub use invoker::{OutputFile, SolverInvoker, SolverRun};
pub use local::LocalRunner;

/// Default hard ceiling for one run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Report switches passed to every run.
const REPORT_SWITCHES: &[&str] = &[
    "writetimetableconflicts",
    "writetimetablesstatistics",
    "writetimetablesxml",
    "writetimetablesdayshorizontal",
    "writetimetablesdaysvertical",
    "writetimetablestimehorizontal",
    "writetimetablestimevertical",
    "writetimetablessubgroups",
    "writetimetablesgroups",
    "writetimetablesyears",
    "writetimetablesteachers",
    "writetimetablesteachersfreeperiods",
    "writetimetablesrooms",
    "writetimetablessubjects",
    "writetimetablesactivitytags",
    "writetimetablesactivities",
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SolverError {
    #[error("Solver environment unavailable: {0}")]
    Unavailable(String),

    #[error("Solver timed out after {}s", .after.as_secs())]
    Timeout { after: Duration, diagnostics: String },

    #[error("Solver exited with {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()))]
    NonZeroExit { code: Option<i32>, diagnostics: String },

    #[error("Solver produced no output files")]
    NoOutput { diagnostics: String },

    #[error("Solver I/O error: {0}")]
    Io(String),
}

impl SolverError {
    /// Captured solver output for operators, empty when none was captured.
    pub fn diagnostics(&self) -> &str {
        match self {
            SolverError::Timeout { diagnostics, .. }
            | SolverError::NonZeroExit { diagnostics, .. }
            | SolverError::NoOutput { diagnostics } => diagnostics,
            SolverError::Unavailable(_) | SolverError::Io(_) => "",
        }
    }
}

pub type SolverResult<T> = Result<T, SolverError>;

/// Options rendered onto the solver command line.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub html_level: u8,
    pub verbose: bool,
    pub export_csv: bool,
    pub timeout: Duration,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            html_level: 7,
            verbose: false,
            export_csv: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SolverOptions {
    pub fn args(&self, paths: &JobPaths) -> Vec<String> {
        let mut args = vec![
            format!("--inputfile={}", paths.input_path),
            format!("--outputdir={}", paths.output_dir),
            format!("--htmllevel={}", self.html_level),
            format!("--verbose={}", self.verbose),
            format!("--timelimitseconds={}", self.timeout.as_secs()),
        ];
        args.extend(REPORT_SWITCHES.iter().map(|s| format!("--{}=true", s)));
        args.push(format!("--exportcsv={}", self.export_csv));
        args
    }
}

/// Locations of one run inside the execution environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub job_id: String,
    pub input_path: String,
    pub output_dir: String,
}

/// Raw result of executing the solver binary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined for operators.
    pub fn diagnostics(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// An execution environment the solver can run in.
///
/// Each method is one step of a run so the invoker can guarantee cleanup between
/// them. Paths are strings in the environment's own namespace.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Human-readable execution target, for logs and status pages.
    fn target(&self) -> String;

    fn job_paths(&self, job_id: &str, input_name: &str) -> JobPaths;

    async fn is_available(&self) -> bool;

    async fn write_input(&self, paths: &JobPaths, content: &[u8]) -> SolverResult<()>;

    async fn create_output_dir(&self, paths: &JobPaths) -> SolverResult<()>;

    /// Run the solver to completion. The invoker enforces the time limit by dropping
    /// this future.
    async fn run(&self, paths: &JobPaths, args: &[String]) -> SolverResult<RunOutput>;

    /// Best-effort stop of a run whose future was dropped.
    async fn terminate(&self, _paths: &JobPaths) -> SolverResult<()> {
        Ok(())
    }

    /// Every file under the output directory, as full paths.
    async fn list_outputs(&self, paths: &JobPaths) -> SolverResult<Vec<String>>;

    async fn read_output(&self, path: &str) -> SolverResult<Vec<u8>>;

    async fn remove_input(&self, paths: &JobPaths) -> SolverResult<()>;

    async fn remove_output_dir(&self, paths: &JobPaths) -> SolverResult<()>;
}
