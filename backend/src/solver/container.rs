//! Runs the solver inside a long-running container through the docker CLI.

use async_trait::async_trait;
use log::debug;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{JobPaths, ProcessRunner, RunOutput, SolverError, SolverResult};

#[derive(Debug, Clone)]
pub struct ContainerRunner {
    /// Container the solver lives in; injected from configuration.
    container: String,
    docker: String,
    binary: String,
    input_root: String,
    output_root: String,
}

impl ContainerRunner {
    pub fn new(
        container: impl Into<String>,
        binary: impl Into<String>,
        input_root: impl Into<String>,
        output_root: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            docker: "docker".to_string(),
            binary: binary.into(),
            input_root: input_root.into(),
            output_root: output_root.into(),
        }
    }

    /// Use a different docker-compatible CLI (e.g. `podman`).
    pub fn with_cli(mut self, cli: impl Into<String>) -> Self {
        self.docker = cli.into();
        self
    }

    /// `docker exec <container> <args...>`, failing on a non-zero exit.
    async fn exec(&self, args: &[&str]) -> SolverResult<std::process::Output> {
        debug!("{} exec {} {:?}", self.docker, self.container, args);
        let output = Command::new(&self.docker)
            .arg("exec")
            .arg(&self.container)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SolverError::Io(format!("failed to start {}: {}", self.docker, e)))?;

        if !output.status.success() {
            return Err(SolverError::Io(format!(
                "{:?} failed in {}: {}",
                args,
                self.container,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl ProcessRunner for ContainerRunner {
    fn target(&self) -> String {
        format!("container {}", self.container)
    }

    fn job_paths(&self, job_id: &str, input_name: &str) -> JobPaths {
        JobPaths {
            job_id: job_id.to_string(),
            input_path: format!("{}/{}_{}", self.input_root, job_id, input_name),
            output_dir: format!("{}/output_{}", self.output_root, job_id),
        }
    }

    async fn is_available(&self) -> bool {
        let output = Command::new(&self.docker)
            .args(["inspect", "-f", "{{.State.Running}}", self.container.as_str()])
            .stdin(Stdio::null())
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim() == "true",
            Ok(out) => {
                debug!(
                    "Container {} not inspectable: {}",
                    self.container,
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                false
            }
            Err(e) => {
                debug!("Could not run {}: {}", self.docker, e);
                false
            }
        }
    }

    async fn write_input(&self, paths: &JobPaths, content: &[u8]) -> SolverResult<()> {
        let mut child = Command::new(&self.docker)
            .args(["exec", "-i", self.container.as_str(), "sh", "-c", "cat > \"$0\"", paths.input_path.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SolverError::Io(format!("failed to start {}: {}", self.docker, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content)
                .await
                .map_err(|e| SolverError::Io(format!("failed to stream input: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SolverError::Io(e.to_string()))?;
        if !output.status.success() {
            return Err(SolverError::Io(format!(
                "failed to write {}: {}",
                paths.input_path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn create_output_dir(&self, paths: &JobPaths) -> SolverResult<()> {
        self.exec(&["mkdir", "-p", &paths.output_dir]).await.map(|_| ())
    }

    async fn run(&self, _paths: &JobPaths, args: &[String]) -> SolverResult<RunOutput> {
        let output = Command::new(&self.docker)
            .arg("exec")
            .arg(&self.container)
            .arg(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SolverError::Io(format!("failed to start {}: {}", self.docker, e)))?;

        Ok(RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn terminate(&self, paths: &JobPaths) -> SolverResult<()> {
        // Killing the docker client does not stop the process inside the container.
        self.exec(&["pkill", "-f", &paths.input_path]).await.map(|_| ())
    }

    async fn list_outputs(&self, paths: &JobPaths) -> SolverResult<Vec<String>> {
        let output = self.exec(&["find", &paths.output_dir, "-type", "f"]).await?;
        let mut files: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        files.sort();
        Ok(files)
    }

    async fn read_output(&self, path: &str) -> SolverResult<Vec<u8>> {
        self.exec(&["cat", path]).await.map(|out| out.stdout)
    }

    async fn remove_input(&self, paths: &JobPaths) -> SolverResult<()> {
        self.exec(&["rm", "-f", &paths.input_path]).await.map(|_| ())
    }

    async fn remove_output_dir(&self, paths: &JobPaths) -> SolverResult<()> {
        self.exec(&["rm", "-rf", &paths.output_dir]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_paths_live_under_configured_roots() {
        let runner = ContainerRunner::new("fet", "fet-cl", "/timetables", "/output");
        let paths = runner.job_paths("12", "term1.fet");
        assert_eq!(paths.input_path, "/timetables/12_term1.fet");
        assert_eq!(paths.output_dir, "/output/output_12");
        assert_eq!(runner.target(), "container fet");
    }

    #[tokio::test]
    async fn missing_cli_reports_unavailable() {
        let runner = ContainerRunner::new("fet", "fet-cl", "/timetables", "/output")
            .with_cli("definitely-not-a-real-docker-cli");
        assert!(!runner.is_available().await);
    }
}
