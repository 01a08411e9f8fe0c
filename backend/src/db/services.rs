//! Repository-agnostic helpers used by the pipeline services.
//!
//! These functions work with any [`FullRepository`] and gather the multi-entity reads
//! that more than one service needs.

use log::debug;

use super::repository::{FullRepository, RepositoryResult};
use crate::interchange::DraftSnapshot;
use crate::models::{Day, DraftId, Period};

/// Check if the repository is reachable.
pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// Load everything the interchange builder reads for one draft.
pub async fn load_draft_snapshot<R: FullRepository + ?Sized>(
    repo: &R,
    draft_id: DraftId,
) -> RepositoryResult<DraftSnapshot> {
    let draft = repo.get_draft(draft_id).await?;
    let timetable = repo.get_timetable(draft.timetable_id).await?;
    let school_id = timetable.school_id;
    let school = repo.get_school(school_id).await?;

    let snapshot = DraftSnapshot {
        days: repo.list_days(draft_id).await?,
        periods: repo.list_periods(draft_id).await?,
        subjects: repo.list_subjects(school_id).await?,
        teachers: repo.list_teachers(school_id).await?,
        qualifications: repo.teacher_qualifications(school_id).await?,
        groups: repo.list_groups(draft_id).await?,
        students: repo.list_students(school_id).await?,
        activities: repo.list_activities(draft_id).await?,
        buildings: repo.list_buildings(school_id).await?,
        rooms: repo.list_rooms(school_id).await?,
        constraints: repo.list_constraints(draft_id).await?,
        school,
        timetable,
        draft,
    };

    debug!(
        "Loaded snapshot of draft {}: {} days, {} periods, {} activities, {} constraints",
        draft_id,
        snapshot.days.len(),
        snapshot.periods.len(),
        snapshot.activities.len(),
        snapshot.constraints.len()
    );
    Ok(snapshot)
}

/// Days and periods of a draft, the calendar the statistics are computed over.
pub async fn load_calendar<R: FullRepository + ?Sized>(
    repo: &R,
    draft_id: DraftId,
) -> RepositoryResult<(Vec<Day>, Vec<Period>)> {
    let days = repo.list_days(draft_id).await?;
    let periods = repo.list_periods(draft_id).await?;
    Ok((days, periods))
}
