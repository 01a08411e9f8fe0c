//! Draft inputs and the draft-level writes made by the pipeline.

use async_trait::async_trait;
use std::collections::HashMap;

use super::error::RepositoryResult;
use crate::models::{
    Activity, Building, ConstraintId, ConstraintScope, Day, DraftConstraint, DraftId, Period,
    Room, School, SchoolId, Student, StudentGroup, Subject, SubjectId, Teacher, Timetable,
    TimetableDraft, TimetableId, UserId,
};

/// A constraint to attach to a draft, already validated against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConstraint {
    pub draft_id: DraftId,
    pub canonical_name: String,
    pub scope: ConstraintScope,
    pub active: bool,
    pub parameters: String,
}

/// Repository trait for timetable drafts and their scheduling inputs.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait TimetableRepository: Send + Sync {
    /// Check if the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    async fn get_school(&self, school_id: SchoolId) -> RepositoryResult<School>;

    async fn get_timetable(&self, timetable_id: TimetableId) -> RepositoryResult<Timetable>;

    async fn get_draft(&self, draft_id: DraftId) -> RepositoryResult<TimetableDraft>;

    /// Drafts of a timetable, oldest first.
    async fn list_drafts(&self, timetable_id: TimetableId) -> RepositoryResult<Vec<TimetableDraft>>;

    /// The newest draft of a timetable that has not been superseded.
    async fn current_draft(&self, timetable_id: TimetableId) -> RepositoryResult<TimetableDraft>;

    async fn list_days(&self, draft_id: DraftId) -> RepositoryResult<Vec<Day>>;

    async fn list_periods(&self, draft_id: DraftId) -> RepositoryResult<Vec<Period>>;

    async fn list_activities(&self, draft_id: DraftId) -> RepositoryResult<Vec<Activity>>;

    async fn list_groups(&self, draft_id: DraftId) -> RepositoryResult<Vec<StudentGroup>>;

    async fn list_subjects(&self, school_id: SchoolId) -> RepositoryResult<Vec<Subject>>;

    async fn list_teachers(&self, school_id: SchoolId) -> RepositoryResult<Vec<Teacher>>;

    /// Subjects each teacher of the school is qualified for.
    async fn teacher_qualifications(
        &self,
        school_id: SchoolId,
    ) -> RepositoryResult<HashMap<UserId, Vec<SubjectId>>>;

    async fn list_students(&self, school_id: SchoolId) -> RepositoryResult<Vec<Student>>;

    async fn list_buildings(&self, school_id: SchoolId) -> RepositoryResult<Vec<Building>>;

    async fn list_rooms(&self, school_id: SchoolId) -> RepositoryResult<Vec<Room>>;

    /// All constraints of a draft, active or not.
    async fn list_constraints(&self, draft_id: DraftId) -> RepositoryResult<Vec<DraftConstraint>>;

    async fn add_constraint(&self, constraint: NewConstraint) -> RepositoryResult<DraftConstraint>;

    async fn set_constraint_active(
        &self,
        draft_id: DraftId,
        constraint_id: ConstraintId,
        active: bool,
    ) -> RepositoryResult<DraftConstraint>;

    /// Record (or clear, with `None`) the operator-facing diagnostic of a draft.
    async fn record_draft_error(
        &self,
        draft_id: DraftId,
        error: Option<String>,
        solver_response: Option<String>,
    ) -> RepositoryResult<()>;

    /// Mark every other live draft of the timetable superseded.
    ///
    /// # Returns
    /// The number of drafts that were marked.
    async fn supersede_other_drafts(
        &self,
        timetable_id: TimetableId,
        keep: DraftId,
    ) -> RepositoryResult<usize>;
}
