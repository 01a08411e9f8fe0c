use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{JobPaths, ProcessRunner, RunOutput, SolverError, SolverOptions, SolverResult};
use crate::storage::content_type;

/// Suffix of the solver's main result document.
pub const PRIMARY_RESULT_SUFFIX: &str = "_data_and_timetable.fet";

/// Suffix of the solver's flat timetable export.
pub const TIMETABLE_CSV_SUFFIX: &str = "timetable.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

/// A successful solver run.
#[derive(Debug, Clone)]
pub struct SolverRun {
    pub files: Vec<OutputFile>,
    pub output: RunOutput,
    pub elapsed: Duration,
}

impl SolverRun {
    /// The result document: `*_data_and_timetable.fet`, else any `.fet`.
    pub fn primary_result(&self) -> Option<&OutputFile> {
        primary_result(&self.files)
    }

    pub fn timetable_csv(&self) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.name.ends_with(TIMETABLE_CSV_SUFFIX))
    }
}

pub fn primary_result(files: &[OutputFile]) -> Option<&OutputFile> {
    files
        .iter()
        .find(|f| f.name.ends_with(PRIMARY_RESULT_SUFFIX))
        .or_else(|| files.iter().find(|f| f.name.ends_with(".fet")))
}

fn is_log_file(path: &str) -> bool {
    let name = file_name(path).to_ascii_lowercase();
    name.ends_with(".txt") || name.ends_with(".log")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Drives single solver runs through a [`ProcessRunner`].
#[derive(Clone)]
pub struct SolverInvoker {
    runner: Arc<dyn ProcessRunner>,
    options: SolverOptions,
}

impl SolverInvoker {
    pub fn new(runner: Arc<dyn ProcessRunner>, options: SolverOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn target(&self) -> String {
        self.runner.target()
    }

    pub async fn is_available(&self) -> bool {
        self.runner.is_available().await
    }

    /// Run the solver once against `input`.
    ///
    /// The staged input and the output directory are removed from the execution
    /// environment whatever the outcome; cleanup failures are logged only.
    pub async fn invoke(&self, job_id: &str, input_name: &str, input: &[u8]) -> SolverResult<SolverRun> {
        let paths = self.runner.job_paths(job_id, input_name);
        let started = Instant::now();
        info!("Starting solver job {} on {}", job_id, self.runner.target());

        let result = self.execute(&paths, input).await;
        self.cleanup(&paths).await;

        let elapsed = started.elapsed();
        match &result {
            Ok((_, files)) => info!(
                "Solver job {} finished in {:.1}s with {} files",
                job_id,
                elapsed.as_secs_f64(),
                files.len()
            ),
            Err(e) => warn!("Solver job {} failed after {:.1}s: {}", job_id, elapsed.as_secs_f64(), e),
        }

        result.map(|(output, files)| SolverRun {
            files,
            output,
            elapsed,
        })
    }

    async fn execute(&self, paths: &JobPaths, input: &[u8]) -> SolverResult<(RunOutput, Vec<OutputFile>)> {
        self.runner.write_input(paths, input).await?;
        self.runner.create_output_dir(paths).await?;

        let args = self.options.args(paths);
        debug!("Solver arguments for job {}: {:?}", paths.job_id, args);

        let output = match tokio::time::timeout(self.options.timeout, self.runner.run(paths, &args)).await {
            Ok(result) => result?,
            Err(_) => {
                if let Err(e) = self.runner.terminate(paths).await {
                    warn!("Could not stop timed-out solver job {}: {}", paths.job_id, e);
                }
                let mut diagnostics = format!(
                    "Solver did not finish within {} seconds",
                    self.options.timeout.as_secs()
                );
                let logs = self.collect_logs(paths).await;
                if !logs.is_empty() {
                    diagnostics.push('\n');
                    diagnostics.push_str(&logs);
                }
                return Err(SolverError::Timeout {
                    after: self.options.timeout,
                    diagnostics,
                });
            }
        };

        if !output.success() {
            return Err(SolverError::NonZeroExit {
                code: output.exit_code,
                diagnostics: output.diagnostics(),
            });
        }

        let listed = self.runner.list_outputs(paths).await?;
        if listed.is_empty() {
            return Err(SolverError::NoOutput {
                diagnostics: output.diagnostics(),
            });
        }

        let mut seen = HashSet::new();
        let mut files = Vec::with_capacity(listed.len());
        for path in listed {
            let name = file_name(&path).to_string();
            if !seen.insert(name.clone()) {
                warn!("Solver job {} produced {} twice, keeping the first", paths.job_id, name);
                continue;
            }
            let content = self.runner.read_output(&path).await?;
            files.push(OutputFile {
                content_type: content_type(&name),
                name,
                content,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok((output, files))
    }

    /// Text logs the solver left in its output directory, each under a header line.
    ///
    /// Used when the run itself was abandoned and its stdout/stderr are gone.
    async fn collect_logs(&self, paths: &JobPaths) -> String {
        let listed = match self.runner.list_outputs(paths).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Could not list logs of solver job {}: {}", paths.job_id, e);
                return String::new();
            }
        };

        let mut sections = Vec::new();
        for path in listed.iter().filter(|p| is_log_file(p)) {
            match self.runner.read_output(path).await {
                Ok(content) => sections.push(format!(
                    "== {} ==\n{}",
                    file_name(path),
                    String::from_utf8_lossy(&content).trim_end()
                )),
                Err(e) => warn!("Could not read solver log {}: {}", path, e),
            }
        }
        sections.join("\n")
    }

    async fn cleanup(&self, paths: &JobPaths) {
        if let Err(e) = self.runner.remove_input(paths).await {
            warn!("Failed to remove solver input {}: {}", paths.input_path, e);
        }
        if let Err(e) = self.runner.remove_output_dir(paths).await {
            warn!("Failed to remove solver output {}: {}", paths.output_dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> OutputFile {
        OutputFile {
            name: name.to_string(),
            content: Vec::new(),
            content_type: content_type(name),
        }
    }

    #[test]
    fn primary_result_prefers_data_and_timetable() {
        let files = vec![file("a.fet"), file("t_data_and_timetable.fet"), file("t.html")];
        assert_eq!(primary_result(&files).unwrap().name, "t_data_and_timetable.fet");

        let files = vec![file("t.html"), file("other.fet")];
        assert_eq!(primary_result(&files).unwrap().name, "other.fet");

        assert!(primary_result(&[file("t.html")]).is_none());
    }

    #[test]
    fn log_files_by_extension() {
        assert!(is_log_file("/out/7/logs/result.txt"));
        assert!(is_log_file("/out/7/solver.LOG"));
        assert!(!is_log_file("/out/7/t_data_and_timetable.fet"));
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name("/output/7/timetables/t/t_timetable.csv"), "t_timetable.csv");
        assert_eq!(file_name("plain.txt"), "plain.txt");
    }
}
