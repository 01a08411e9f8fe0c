//! Scheduling inputs owned by a timetable draft.
//!
//! A [`TimetableDraft`] is one configurable scenario of a school's timetable. It owns
//! the ordered days and periods of the cycle, the activities to place, and the
//! constraints the solver must honour. Rooms, buildings, subjects and people belong to
//! the school and are shared by every draft.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{
    ActivityId, BuildingId, DayId, DraftId, GroupId, PeriodId, RoomId, SchoolId, SubjectId,
    TimetableId, UserId,
};

/// Capacity reported to the solver for rooms without a recorded capacity.
pub const DEFAULT_ROOM_CAPACITY: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    pub id: TimetableId,
    pub school_id: SchoolId,
    pub name: String,
}

/// A versioned scheduling scenario.
///
/// Drafts are never deleted: when a newer draft of the same timetable is generated and
/// imported, older drafts get `superseded_at` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableDraft {
    pub id: DraftId,
    pub timetable_id: TimetableId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub superseded_at: Option<DateTime<Utc>>,
    /// Last execution or import diagnostic, shown to operators.
    pub error: Option<String>,
    /// Raw diagnostic stream of the last failed solver run.
    pub solver_response: Option<String>,
}

impl TimetableDraft {
    pub fn is_superseded(&self) -> bool {
        self.superseded_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub id: DayId,
    pub draft_id: DraftId,
    pub name: String,
    /// Position of the day inside the cycle, starting at 1.
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    pub draft_id: DraftId,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub position: u32,
}

impl Period {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Returns the periods ordered by start time, rejecting empty or overlapping slots.
pub fn ordered_periods(periods: &[Period]) -> Result<Vec<Period>, String> {
    let mut ordered = periods.to_vec();
    ordered.sort_by_key(|p| (p.start, p.position));

    for period in &ordered {
        if period.end <= period.start {
            return Err(format!(
                "Period {} ends at {} which is not after its start {}",
                period.id, period.end, period.start
            ));
        }
    }

    for pair in ordered.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(format!(
                "Period {} ({}-{}) overlaps period {} ({}-{})",
                pair[1].id, pair[1].start, pair[1].end, pair[0].id, pair[0].start, pair[0].end
            ));
        }
    }

    Ok(ordered)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub year_level: String,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A named cohort of students inside one year level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentGroup {
    pub id: GroupId,
    pub name: String,
    pub year_level: String,
    pub members: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub building_id: Option<BuildingId>,
    pub capacity: Option<u32>,
}

/// A teaching unit to be placed by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub draft_id: DraftId,
    pub subject_id: SubjectId,
    pub teacher_ids: Vec<UserId>,
    pub group_ids: Vec<GroupId>,
    pub year_levels: Vec<String>,
    pub student_ids: Vec<UserId>,
    pub periods_per_instance: u32,
    pub total_periods: u32,
    pub preferred_rooms: Vec<RoomId>,
}

impl Activity {
    /// All student sets attending the activity, groups first, then years, then students.
    pub fn student_sets(&self) -> Vec<StudentSet> {
        self.group_ids
            .iter()
            .copied()
            .map(StudentSet::Group)
            .chain(self.year_levels.iter().cloned().map(StudentSet::Year))
            .chain(self.student_ids.iter().cloned().map(StudentSet::Student))
            .collect()
    }
}

/// A set of students addressable by the solver.
///
/// The solver namespace is flat, so each kind is prefixed: `G` for groups, `Y` for
/// year levels and `S` for individual students.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StudentSet {
    Group(GroupId),
    Year(String),
    Student(UserId),
}

impl fmt::Display for StudentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentSet::Group(id) => write!(f, "G{}", id),
            StudentSet::Year(level) => write!(f, "Y{}", level),
            StudentSet::Student(id) => write!(f, "S{}", id),
        }
    }
}

impl FromStr for StudentSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let prefix = chars.next();
        let rest = chars.as_str();
        if rest.is_empty() {
            return Err(format!("Invalid student set identifier: '{}'", s));
        }
        match prefix {
            Some('G') => rest
                .parse::<GroupId>()
                .map(StudentSet::Group)
                .map_err(|e| format!("Invalid group identifier '{}': {}", s, e)),
            Some('Y') => Ok(StudentSet::Year(rest.to_string())),
            Some('S') => Ok(StudentSet::Student(UserId::new(rest))),
            _ => Err(format!("Invalid student set identifier: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(id: i64, start: (u32, u32), end: (u32, u32), position: u32) -> Period {
        Period {
            id: PeriodId::new(id),
            draft_id: DraftId::new(1),
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            position,
        }
    }

    #[test]
    fn ordered_periods_sorts_by_start_time() {
        let periods = vec![
            period(2, (10, 0), (11, 0), 2),
            period(1, (9, 0), (10, 0), 1),
        ];
        let ordered = ordered_periods(&periods).unwrap();
        assert_eq!(ordered[0].id, PeriodId::new(1));
        assert_eq!(ordered[1].id, PeriodId::new(2));
        assert_eq!(ordered[0].duration_minutes(), 60);
    }

    #[test]
    fn ordered_periods_rejects_overlap() {
        let periods = vec![
            period(1, (9, 0), (10, 0), 1),
            period(2, (9, 30), (10, 30), 2),
        ];
        let err = ordered_periods(&periods).unwrap_err();
        assert!(err.contains("overlaps"));
    }

    #[test]
    fn ordered_periods_rejects_inverted_period() {
        let periods = vec![period(1, (10, 0), (9, 0), 1)];
        assert!(ordered_periods(&periods).is_err());
    }

    #[test]
    fn student_set_identifiers_round_trip() {
        let sets = [
            StudentSet::Group(GroupId::new(12)),
            StudentSet::Year("9".to_string()),
            StudentSet::Student(UserId::new("abc")),
        ];
        let rendered: Vec<String> = sets.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["G12", "Y9", "Sabc"]);
        for (set, text) in sets.iter().zip(&rendered) {
            assert_eq!(&text.parse::<StudentSet>().unwrap(), set);
        }
    }

    #[test]
    fn student_set_rejects_unknown_prefix() {
        assert!("X1".parse::<StudentSet>().is_err());
        assert!("G".parse::<StudentSet>().is_err());
        assert!("Gx".parse::<StudentSet>().is_err());
    }
}
