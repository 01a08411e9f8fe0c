//! Service layer of the generation pipeline.
//!
//! Services sit between the repository/storage/solver layers and the HTTP surface.
//! [`PipelineContext`] wires them together around one repository, one artifact store
//! and one solver invoker, and owns the handle of the single queue worker.

pub mod constraints;
pub mod error;
pub mod generation;
pub mod importer;
pub mod job_tracker;
pub mod processor;
pub mod queue;
pub mod statistics;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::db::repository::FullRepository;
use crate::solver::SolverInvoker;
use crate::storage::ArtifactStore;

pub use constraints::ConstraintService;
pub use error::{PipelineError, PipelineResult};
pub use generation::{ArtifactListing, GenerationRequest, GenerationService, Preview, Submission};
pub use importer::{read_results, ImportSummary, ResultImporter};
pub use job_tracker::{Job, JobStatus, JobTracker, LogEntry, LogLevel};
pub use processor::{ProcessOutcome, QueueProcessor};
pub use queue::JobQueueManager;
pub use statistics::{
    compute_statistics, DraftStatistics, LoadSummary, PersonKind, PersonLoad, StatisticsService,
    StudentDirectory,
};
pub use worker::{QueueWorker, WorkerHandle};

#[derive(Clone)]
pub struct PipelineContext {
    pub repository: Arc<dyn FullRepository>,
    pub store: Arc<dyn ArtifactStore>,
    pub invoker: Arc<SolverInvoker>,
    pub queue: JobQueueManager,
    pub generation: GenerationService,
    pub importer: ResultImporter,
    pub statistics: StatisticsService,
    pub constraints: ConstraintService,
    pub worker: WorkerHandle,
    processor: QueueProcessor,
}

impl PipelineContext {
    pub fn new(
        repository: Arc<dyn FullRepository>,
        store: Arc<dyn ArtifactStore>,
        invoker: SolverInvoker,
    ) -> Self {
        let invoker = Arc::new(invoker);
        let queue = JobQueueManager::new(repository.clone(), JobTracker::new());
        let processor = QueueProcessor::new(
            repository.clone(),
            store.clone(),
            invoker.clone(),
            queue.clone(),
        );
        Self {
            generation: GenerationService::new(
                repository.clone(),
                store.clone(),
                invoker.clone(),
                queue.clone(),
            ),
            importer: ResultImporter::new(repository.clone(), store.clone()),
            statistics: StatisticsService::new(repository.clone()),
            constraints: ConstraintService::new(repository.clone()),
            worker: WorkerHandle::new(),
            processor,
            queue,
            repository,
            store,
            invoker,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        self.queue.tracker()
    }

    /// The queue processor. Every clone shares one pending settlement.
    pub fn processor(&self) -> QueueProcessor {
        self.processor.clone()
    }

    /// Spawn the queue worker. Call once per process.
    pub fn start_worker(&self, poll_interval: Duration) -> JoinHandle<()> {
        QueueWorker::new(self.processor(), self.worker.clone(), poll_interval).spawn()
    }

    /// Submit a generation request and wake the worker.
    pub async fn submit(&self, request: GenerationRequest) -> PipelineResult<Submission> {
        let submission = self.generation.submit(request).await?;
        self.worker.trigger();
        Ok(submission)
    }
}
