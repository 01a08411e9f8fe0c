//! Generation queue storage.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{ClaimOutcome, NewQueueEntry, QueueEntry, QueueEntryId, TimetableId};

/// Repository trait for the generation queue.
///
/// Implementations must make [`claim_next`](QueueRepository::claim_next) atomic: the
/// check for a running entry, the FIFO selection and the transition to `inProgress`
/// happen as one step, so at most one entry is ever `inProgress`.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Append a `queued` entry.
    async fn enqueue(&self, entry: NewQueueEntry) -> RepositoryResult<QueueEntry>;

    /// Claim the oldest queued entry unless another one is already running.
    async fn claim_next(&self) -> RepositoryResult<ClaimOutcome>;

    /// Transition an `inProgress` entry to `completed`.
    async fn complete(&self, entry_id: QueueEntryId) -> RepositoryResult<QueueEntry>;

    /// Transition an `inProgress` entry to `failed`, keeping the diagnostics.
    async fn fail(&self, entry_id: QueueEntryId, diagnostics: String) -> RepositoryResult<QueueEntry>;

    async fn get_queue_entry(&self, entry_id: QueueEntryId) -> RepositoryResult<QueueEntry>;

    /// Entries of a timetable, oldest first.
    async fn list_queue_entries(&self, timetable_id: TimetableId) -> RepositoryResult<Vec<QueueEntry>>;

    /// The entry currently running, if any.
    async fn in_progress(&self) -> RepositoryResult<Option<QueueEntry>>;
}
