//! Solved activity storage.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{DraftId, SolvedActivity};

#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Replace the whole result set of a draft.
    ///
    /// All-or-nothing: either every row is stored and the previous set is gone, or the
    /// previous set is left untouched. Duplicate activity ids are rejected.
    ///
    /// # Returns
    /// The number of rows stored.
    async fn replace_solved_activities(
        &self,
        draft_id: DraftId,
        activities: Vec<SolvedActivity>,
    ) -> RepositoryResult<usize>;

    /// Result rows of a draft ordered by activity id.
    async fn list_solved_activities(&self, draft_id: DraftId) -> RepositoryResult<Vec<SolvedActivity>>;
}
