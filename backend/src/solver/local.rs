//! Runs the solver as a plain subprocess under a local work directory.

use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{JobPaths, ProcessRunner, RunOutput, SolverError, SolverResult};

#[derive(Debug, Clone)]
pub struct LocalRunner {
    binary: PathBuf,
    work_root: PathBuf,
}

fn io(context: &str, e: std::io::Error) -> SolverError {
    SolverError::Io(format!("{}: {}", context, e))
}

impl LocalRunner {
    pub fn new(binary: impl Into<PathBuf>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            work_root: work_root.into(),
        }
    }

    fn binary_resolvable(&self) -> bool {
        if self.binary.components().count() > 1 {
            return self.binary.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(&self.binary).is_file()))
            .unwrap_or(false)
    }
}

async fn collect_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path().to_string_lossy().into_owned());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn remove_if_present(result: std::io::Result<()>, what: &str) -> SolverResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io(what, e)),
    }
}

#[async_trait]
impl ProcessRunner for LocalRunner {
    fn target(&self) -> String {
        format!("local {}", self.binary.display())
    }

    fn job_paths(&self, job_id: &str, input_name: &str) -> JobPaths {
        JobPaths {
            job_id: job_id.to_string(),
            input_path: self
                .work_root
                .join("input")
                .join(format!("{}_{}", job_id, input_name))
                .to_string_lossy()
                .into_owned(),
            output_dir: self
                .work_root
                .join("output")
                .join(format!("output_{}", job_id))
                .to_string_lossy()
                .into_owned(),
        }
    }

    async fn is_available(&self) -> bool {
        if !self.binary_resolvable() {
            debug!("Solver binary {} not found", self.binary.display());
            return false;
        }
        tokio::fs::create_dir_all(&self.work_root).await.is_ok()
    }

    async fn write_input(&self, paths: &JobPaths, content: &[u8]) -> SolverResult<()> {
        let path = Path::new(&paths.input_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io("create input directory", e))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| io("write input", e))
    }

    async fn create_output_dir(&self, paths: &JobPaths) -> SolverResult<()> {
        tokio::fs::create_dir_all(&paths.output_dir)
            .await
            .map_err(|e| io("create output directory", e))
    }

    async fn run(&self, _paths: &JobPaths, args: &[String]) -> SolverResult<RunOutput> {
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.work_root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| io("start solver", e))?;

        Ok(RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn list_outputs(&self, paths: &JobPaths) -> SolverResult<Vec<String>> {
        collect_files(Path::new(&paths.output_dir))
            .await
            .map_err(|e| io("list outputs", e))
    }

    async fn read_output(&self, path: &str) -> SolverResult<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| io("read output", e))
    }

    async fn remove_input(&self, paths: &JobPaths) -> SolverResult<()> {
        remove_if_present(tokio::fs::remove_file(&paths.input_path).await, "remove input")
    }

    async fn remove_output_dir(&self, paths: &JobPaths) -> SolverResult<()> {
        remove_if_present(tokio::fs::remove_dir_all(&paths.output_dir).await, "remove output")
    }
}
