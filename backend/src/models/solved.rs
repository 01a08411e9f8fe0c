//! Solver results mapped back onto the draft.

use serde::{Deserialize, Serialize};

use super::ids::{DayId, PeriodId, RoomId};

/// Sentinel used for day, period and room when the solver left an activity unplaced.
pub const UNSCHEDULED: i64 = 0;

/// One placed (or unplaced) split activity of a draft revision.
///
/// Teacher and student references are kept as the identifiers that were sent to the
/// solver, so a result can be interpreted without the draft that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedActivity {
    pub activity_id: u32,
    pub teacher_ids: Vec<String>,
    pub subject_id: String,
    pub student_ids: Vec<String>,
    pub day: DayId,
    pub period: PeriodId,
    pub room: RoomId,
    pub duration: u32,
}

impl SolvedActivity {
    pub fn is_scheduled(&self) -> bool {
        self.day.value() != UNSCHEDULED && self.period.value() != UNSCHEDULED
    }

    pub fn has_room(&self) -> bool {
        self.room.value() != UNSCHEDULED
    }
}
