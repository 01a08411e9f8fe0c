//! Domain models for the timetable generation pipeline.
//!
//! - [`ids`]: strongly typed identifiers
//! - [`timetable`]: drafts and the scheduling inputs they own
//! - [`constraint`]: the typed constraint registry
//! - [`queue`]: generation queue entries
//! - [`solved`]: solver results mapped onto a draft

#[macro_use]
pub mod macros;

pub mod constraint;
pub mod ids;
pub mod queue;
pub mod solved;
pub mod timetable;

pub use constraint::{
    lookup_constraint, ConstraintError, ConstraintKind, ConstraintScope, DraftConstraint,
    CONSTRAINT_REGISTRY, HARD_WEIGHT, PREFERRED_ROOM_WEIGHT,
};
pub use ids::*;
pub use queue::{ClaimOutcome, NewQueueEntry, QueueEntry, QueueStatus};
pub use solved::{SolvedActivity, UNSCHEDULED};
pub use timetable::{
    ordered_periods, Activity, Building, Day, Period, Room, School, Student, StudentGroup,
    StudentSet, Subject, Teacher, Timetable, TimetableDraft, DEFAULT_ROOM_CAPACITY,
};
