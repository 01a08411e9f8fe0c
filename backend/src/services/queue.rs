//! Job Queue Manager.
//!
//! A durable FIFO of generation requests. The repository enforces the single-flight
//! rule atomically inside `claim_next`; this layer adds transition logging and keeps
//! the progress tracker in step with the stored entries.

use log::{debug, info, warn};
use std::sync::Arc;

use super::error::PipelineResult;
use super::job_tracker::{JobTracker, LogLevel};
use crate::db::repository::FullRepository;
use crate::models::{ClaimOutcome, NewQueueEntry, QueueEntry, QueueEntryId, TimetableId};

#[derive(Clone)]
pub struct JobQueueManager {
    repository: Arc<dyn FullRepository>,
    tracker: JobTracker,
}

impl JobQueueManager {
    pub fn new(repository: Arc<dyn FullRepository>, tracker: JobTracker) -> Self {
        Self {
            repository,
            tracker,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Append a `queued` entry and return it immediately.
    pub async fn enqueue(&self, entry: NewQueueEntry) -> PipelineResult<QueueEntry> {
        let entry = self.repository.enqueue(entry).await?;
        info!(
            "Queued generation {} for timetable {} (draft {}, input {})",
            entry.id, entry.timetable_id, entry.draft_id, entry.input_artifact
        );
        self.tracker.track(entry.id);
        self.tracker.log(
            entry.id,
            LogLevel::Info,
            format!("Queued by {} with input {}", entry.submitted_by, entry.input_file_name()),
        );
        Ok(entry)
    }

    /// Claim the oldest queued entry unless another one is running.
    pub async fn claim_next(&self) -> PipelineResult<ClaimOutcome> {
        let outcome = self.repository.claim_next().await?;
        match &outcome {
            ClaimOutcome::Claimed(entry) => {
                info!("Generation {} is now in progress", entry.id);
                self.tracker.start(entry.id);
                self.tracker
                    .log(entry.id, LogLevel::Info, "Picked up by the queue worker");
            }
            ClaimOutcome::Busy(running) => {
                debug!("Queue busy: generation {} still in progress", running);
            }
            ClaimOutcome::Empty => debug!("Queue empty"),
        }
        Ok(outcome)
    }

    /// Mark a running entry completed.
    ///
    /// The progress log stays open so the import that follows can still report into
    /// it; callers close it with [`JobTracker::complete_job`].
    pub async fn complete(&self, entry_id: QueueEntryId) -> PipelineResult<QueueEntry> {
        let entry = self.repository.complete(entry_id).await?;
        info!("Generation {} completed", entry_id);
        Ok(entry)
    }

    pub async fn fail(&self, entry_id: QueueEntryId, diagnostics: String) -> PipelineResult<QueueEntry> {
        let entry = self.repository.fail(entry_id, diagnostics.clone()).await?;
        warn!("Generation {} failed: {}", entry_id, first_line(&diagnostics));
        self.tracker.fail_job(entry_id, diagnostics);
        Ok(entry)
    }

    pub async fn get(&self, entry_id: QueueEntryId) -> PipelineResult<QueueEntry> {
        Ok(self.repository.get_queue_entry(entry_id).await?)
    }

    /// Entries for one timetable, oldest first.
    pub async fn list(&self, timetable_id: TimetableId) -> PipelineResult<Vec<QueueEntry>> {
        Ok(self.repository.list_queue_entries(timetable_id).await?)
    }

    pub async fn in_progress(&self) -> PipelineResult<Option<QueueEntry>> {
        Ok(self.repository.in_progress().await?)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::models::{DraftId, QueueStatus, SchoolId, UserId};
    use crate::services::job_tracker::JobStatus;

    fn new_entry(n: i64) -> NewQueueEntry {
        NewQueueEntry {
            school_id: SchoolId::new(1),
            timetable_id: TimetableId::new(1),
            draft_id: DraftId::new(1),
            submitted_by: UserId::new("admin"),
            input_artifact: format!("1/1/input/t{}.fet", n),
            input_checksum: "00".to_string(),
        }
    }

    #[tokio::test]
    async fn transitions_are_mirrored_in_tracker() {
        let queue = JobQueueManager::new(Arc::new(LocalRepository::new()), JobTracker::new());
        let first = queue.enqueue(new_entry(1)).await.unwrap();
        let second = queue.enqueue(new_entry(2)).await.unwrap();

        let claimed = match queue.claim_next().await.unwrap() {
            ClaimOutcome::Claimed(entry) => entry,
            other => panic!("expected claim, got {:?}", other),
        };
        assert_eq!(claimed.id, first.id);
        assert_eq!(queue.tracker().get_job(first.id).unwrap().status, JobStatus::Running);

        assert_eq!(
            queue.claim_next().await.unwrap(),
            ClaimOutcome::Busy(first.id)
        );

        queue.fail(first.id, "exit 1\nmore".to_string()).await.unwrap();
        assert_eq!(queue.get(first.id).await.unwrap().status, QueueStatus::Failed);
        assert_eq!(queue.tracker().get_job(first.id).unwrap().status, JobStatus::Failed);

        assert!(matches!(
            queue.claim_next().await.unwrap(),
            ClaimOutcome::Claimed(entry) if entry.id == second.id
        ));
        queue.complete(second.id).await.unwrap();
        assert_eq!(queue.tracker().get_job(second.id).unwrap().status, JobStatus::Running);
        assert_eq!(queue.claim_next().await.unwrap(), ClaimOutcome::Empty);
        assert!(queue.in_progress().await.unwrap().is_none());
        assert_eq!(queue.list(TimetableId::new(1)).await.unwrap().len(), 2);
    }
}
