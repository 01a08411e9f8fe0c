//! One queue-draining step.
//!
//! Claims the next entry, runs the solver on its input, uploads every output file,
//! settles the entry and imports the results. An entry is `completed` once the solver
//! succeeded and its outputs are stored; a later import failure is recorded on the
//! draft and in the job log without touching the entry again.
//!
//! Settling is the one write that must not be lost: an entry left `inProgress` blocks
//! the queue. When the transition fails with a retryable repository error, the
//! settlement is kept and retried before anything new is claimed.

use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use super::importer::ResultImporter;
use super::job_tracker::LogLevel;
use super::queue::JobQueueManager;
use crate::db::calculate_checksum;
use crate::db::repository::FullRepository;
use crate::models::{ClaimOutcome, QueueEntry, QueueEntryId};
use crate::solver::{SolverInvoker, SolverRun};
use crate::storage::{ArtifactKey, ArtifactStore};

/// Diagnostic recorded on entries found `inProgress` when the worker starts.
pub const INTERRUPTED: &str = "Generation was interrupted before it finished";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// An entry was run to a terminal state.
    Processed(QueueEntryId),
    /// Another entry is in progress.
    Busy(QueueEntryId),
    /// Nothing is queued.
    Idle,
}

/// How a claimed entry ends.
#[derive(Debug, Clone)]
enum Settlement {
    Completed(SolverRun),
    Failed { message: String, diagnostics: String },
}

impl Settlement {
    fn failed(err: PipelineError) -> Self {
        match err {
            PipelineError::Execution { message, diagnostics } => Settlement::Failed { message, diagnostics },
            other => Settlement::Failed {
                message: other.to_string(),
                diagnostics: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Unsettled {
    entry: QueueEntry,
    settlement: Settlement,
}

/// Drains the queue one entry per call. Clones share the pending settlement.
#[derive(Clone)]
pub struct QueueProcessor {
    repository: Arc<dyn FullRepository>,
    store: Arc<dyn ArtifactStore>,
    invoker: Arc<SolverInvoker>,
    queue: JobQueueManager,
    importer: ResultImporter,
    unsettled: Arc<Mutex<Option<Unsettled>>>,
}

impl QueueProcessor {
    pub fn new(
        repository: Arc<dyn FullRepository>,
        store: Arc<dyn ArtifactStore>,
        invoker: Arc<SolverInvoker>,
        queue: JobQueueManager,
    ) -> Self {
        let importer = ResultImporter::new(repository.clone(), store.clone());
        Self {
            repository,
            store,
            invoker,
            queue,
            importer,
            unsettled: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a finished run is still waiting for its entry to be settled.
    pub fn has_unsettled(&self) -> bool {
        self.unsettled.lock().is_some()
    }

    pub async fn process_next(&self) -> PipelineResult<ProcessOutcome> {
        if let Some(id) = self.settle_pending().await? {
            return Ok(ProcessOutcome::Processed(id));
        }

        let entry = match self.queue.claim_next().await? {
            ClaimOutcome::Claimed(entry) => entry,
            ClaimOutcome::Busy(id) => return Ok(ProcessOutcome::Busy(id)),
            ClaimOutcome::Empty => return Ok(ProcessOutcome::Idle),
        };

        let id = entry.id;
        let settlement = match self.execute(&entry).await {
            Ok(run) => Settlement::Completed(run),
            Err(err) => Settlement::failed(err),
        };
        self.settle(entry, settlement).await?;
        Ok(ProcessOutcome::Processed(id))
    }

    /// Fail an entry left `inProgress` by an earlier process.
    ///
    /// Only the queue worker calls this, once, before its first step; at that point
    /// nothing in this process can be running the entry.
    pub async fn recover_interrupted(&self) -> PipelineResult<Option<QueueEntryId>> {
        let Some(entry) = self.queue.in_progress().await? else {
            return Ok(None);
        };
        let pending = self
            .unsettled
            .lock()
            .as_ref()
            .is_some_and(|pending| pending.entry.id == entry.id);
        if pending {
            return Ok(None);
        }

        warn!("Generation {} was left in progress, marking it failed", entry.id);
        self.settle(
            entry.clone(),
            Settlement::Failed {
                message: INTERRUPTED.to_string(),
                diagnostics: String::new(),
            },
        )
        .await?;
        Ok(Some(entry.id))
    }

    /// Retry a settlement that could not be stored earlier.
    async fn settle_pending(&self) -> PipelineResult<Option<QueueEntryId>> {
        let pending = self.unsettled.lock().take();
        let Some(pending) = pending else {
            return Ok(None);
        };
        let id = pending.entry.id;

        match self.queue.get(id).await {
            Ok(stored) if stored.status.is_terminal() => {
                info!("Generation {} is already {}", id, stored.status);
                return Ok(None);
            }
            Ok(_) => {}
            Err(err) => {
                *self.unsettled.lock() = Some(pending);
                return Err(err);
            }
        }

        info!("Retrying settlement of generation {}", id);
        self.settle(pending.entry, pending.settlement).await?;
        Ok(Some(id))
    }

    /// Fetch the input, run the solver and upload its outputs.
    async fn execute(&self, entry: &QueueEntry) -> PipelineResult<SolverRun> {
        let tracker = self.queue.tracker();
        let key: ArtifactKey = entry.input_artifact.parse()?;
        let input = self.store.get(&key).await?;
        let checksum = calculate_checksum(&input);
        if checksum != entry.input_checksum {
            return Err(PipelineError::Execution {
                message: format!("Input {} does not match its recorded checksum", key),
                diagnostics: format!("expected {}, stored content has {}", entry.input_checksum, checksum),
            });
        }

        tracker.log(
            entry.id,
            LogLevel::Info,
            format!("Running solver on {} ({} bytes)", self.invoker.target(), input.len()),
        );
        // Entry ids restart with an in-memory repository; the suffix keeps a run from
        // picking up files a crashed earlier process left in the environment.
        let job_id = format!("{}-{}", entry.id, Uuid::new_v4().simple());
        let run = self
            .invoker
            .invoke(&job_id, entry.input_file_name(), &input)
            .await?;
        tracker.log(
            entry.id,
            LogLevel::Info,
            format!(
                "Solver finished in {:.1}s with {} output files",
                run.elapsed.as_secs_f64(),
                run.files.len()
            ),
        );

        for file in &run.files {
            let mut key = ArtifactKey::output(entry.school_id, entry.timetable_id, &file.name)?;
            if let Some(folder) = entry.run() {
                key = key.in_run(folder)?;
            }
            self.store
                .put(&key, file.content.clone(), file.content_type)
                .await?;
        }
        tracker.log(
            entry.id,
            LogLevel::Info,
            format!("Uploaded {} output files", run.files.len()),
        );
        Ok(run)
    }

    /// Store the terminal transition, then do the follow-up work for it.
    async fn settle(&self, entry: QueueEntry, settlement: Settlement) -> PipelineResult<()> {
        let transition = match &settlement {
            Settlement::Completed(_) => self.queue.complete(entry.id).await,
            Settlement::Failed { message, diagnostics } => {
                self.queue.fail(entry.id, failure_report(message, diagnostics)).await
            }
        };
        if let Err(err) = transition {
            if err.is_retryable() {
                error!("Could not settle generation {}, will retry: {}", entry.id, err);
                self.queue.tracker().log(
                    entry.id,
                    LogLevel::Warning,
                    format!("Could not record the outcome yet: {}", err),
                );
                *self.unsettled.lock() = Some(Unsettled { entry, settlement });
            } else {
                error!("Could not settle generation {}: {}", entry.id, err);
            }
            return Err(err);
        }

        match settlement {
            Settlement::Completed(run) => self.import(&entry, run).await,
            Settlement::Failed { message, diagnostics } => {
                self.record_failure(&entry, message, diagnostics).await
            }
        }
    }

    async fn import(&self, entry: &QueueEntry, run: SolverRun) -> PipelineResult<()> {
        let tracker = self.queue.tracker();
        let files: Vec<&str> = run.files.iter().map(|f| f.name.as_str()).collect();
        let mut result = serde_json::json!({
            "files": files,
            "elapsedSecs": run.elapsed.as_secs_f64(),
        });

        match self.importer.import_files(entry.draft_id, &run.files).await {
            Ok(summary) => {
                tracker.log(
                    entry.id,
                    LogLevel::Success,
                    format!(
                        "Imported {} activities ({} unscheduled) from {}",
                        summary.imported, summary.unscheduled, summary.source
                    ),
                );
                result["import"] = serde_json::to_value(&summary).unwrap_or_default();
            }
            Err(err) => {
                error!("Import for generation {} failed: {}", entry.id, err);
                tracker.log(entry.id, LogLevel::Error, format!("Import failed: {}", err));
                result["importError"] = serde_json::Value::String(err.to_string());
                tracker.complete_job(entry.id, Some(result));
                self.repository
                    .record_draft_error(entry.draft_id, Some(err.to_string()), None)
                    .await?;
                return Ok(());
            }
        }

        tracker.complete_job(entry.id, Some(result));
        Ok(())
    }

    async fn record_failure(&self, entry: &QueueEntry, message: String, diagnostics: String) -> PipelineResult<()> {
        let solver_response = (!diagnostics.is_empty()).then_some(diagnostics);
        self.repository
            .record_draft_error(entry.draft_id, Some(message), solver_response)
            .await?;
        info!("Recorded failure of generation {} on draft {}", entry.id, entry.draft_id);
        Ok(())
    }
}

fn failure_report(message: &str, diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        message.to_string()
    } else {
        format!("{}\n{}", message, diagnostics)
    }
}
