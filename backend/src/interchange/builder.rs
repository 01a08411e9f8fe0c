//! Interchange Model Builder.
//!
//! Turns a draft snapshot into an [`InterchangeDocument`]. The builder is pure: all
//! repository access happens before it runs (see `db::services::load_draft_snapshot`),
//! so the same snapshot always yields the same document.

use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::document::{
    ActivityEntry, GroupEntry, InterchangeDocument, RoomEntry, SubgroupEntry, TeacherEntry,
    YearEntry,
};
use super::{InterchangeError, InterchangeResult};
use crate::models::constraint::{ActivityPreferredRooms, BasicCompulsory};
use crate::models::{
    ordered_periods, Activity, ActivityId, Building, ConstraintId, ConstraintKind, ConstraintScope,
    Day, DraftConstraint, Period, Room, School, Student, StudentGroup, Subject, SubjectId, Teacher,
    Timetable, TimetableDraft, UserId, DEFAULT_ROOM_CAPACITY, PREFERRED_ROOM_WEIGHT,
};

/// Everything the builder reads, loaded up front.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    pub school: School,
    pub timetable: Timetable,
    pub draft: TimetableDraft,
    pub days: Vec<Day>,
    pub periods: Vec<Period>,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
    /// Subjects each teacher is qualified to teach.
    pub qualifications: HashMap<UserId, Vec<SubjectId>>,
    pub groups: Vec<StudentGroup>,
    /// Every student of the school, used for the per-year roster groups.
    pub students: Vec<Student>,
    pub activities: Vec<Activity>,
    pub buildings: Vec<Building>,
    pub rooms: Vec<Room>,
    pub constraints: Vec<DraftConstraint>,
}

/// Something the builder left out of the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BuildWarning {
    #[serde(rename_all = "camelCase")]
    ActivityDropped { activity_id: ActivityId, reason: String },
    #[serde(rename_all = "camelCase")]
    ConstraintSkipped {
        constraint_id: ConstraintId,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub document: InterchangeDocument,
    pub warnings: Vec<BuildWarning>,
}

/// Split durations for an activity: `ceil(total / per_instance)` blocks of
/// `per_instance`, the last one shortened so the durations sum to `total`.
pub fn split_durations(total: u32, per_instance: u32) -> Vec<u32> {
    if total == 0 || per_instance == 0 {
        return Vec::new();
    }
    let count = total.div_ceil(per_instance);
    let mut durations = vec![per_instance; count as usize];
    if let Some(last) = durations.last_mut() {
        *last = total - (count - 1) * per_instance;
    }
    durations
}

pub fn build_document(snapshot: &DraftSnapshot) -> InterchangeResult<BuildOutcome> {
    let mut warnings = Vec::new();

    let mut days = snapshot.days.clone();
    days.sort_by_key(|d| (d.position, d.id));
    let periods = ordered_periods(&snapshot.periods).map_err(InterchangeError::InvalidDraft)?;

    let activities = build_activities(&snapshot.activities, &mut warnings);
    let (time_constraints, mut space_constraints) =
        build_constraints(&snapshot.constraints, &mut warnings);

    let preferred = preferred_room_constraints(&snapshot.activities, &activities);
    if !preferred.is_empty() {
        space_constraints
            .entry(ConstraintKind::ACTIVITY_PREFERRED_ROOMS.to_string())
            .or_default()
            .extend(preferred);
    }

    let buildings: HashMap<_, _> = snapshot.buildings.iter().map(|b| (b.id, b)).collect();

    let document = InterchangeDocument {
        institution_name: snapshot.school.name.clone(),
        days: days.iter().map(|d| d.id.to_string()).collect(),
        hours: periods.iter().map(|p| p.id.to_string()).collect(),
        subjects: snapshot.subjects.iter().map(|s| s.id.to_string()).collect(),
        teachers: snapshot
            .teachers
            .iter()
            .map(|t| TeacherEntry {
                name: t.id.to_string(),
                qualified_subjects: snapshot
                    .qualifications
                    .get(&t.id)
                    .map(|subjects| subjects.iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
            })
            .collect(),
        years: build_years(&snapshot.groups, &snapshot.students),
        activities,
        buildings: snapshot.buildings.iter().map(|b| b.id.to_string()).collect(),
        rooms: snapshot
            .rooms
            .iter()
            .map(|r| RoomEntry {
                name: r.id.to_string(),
                building: r
                    .building_id
                    .filter(|id| buildings.contains_key(id))
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                capacity: r.capacity.unwrap_or(DEFAULT_ROOM_CAPACITY),
            })
            .collect(),
        time_constraints,
        space_constraints,
    };

    debug!(
        "Built interchange document for draft {}: {} activities, {} constraints, {} warnings",
        snapshot.draft.id,
        document.activities.len(),
        document.constraint_count(),
        warnings.len()
    );

    Ok(BuildOutcome { document, warnings })
}

fn build_activities(source: &[Activity], warnings: &mut Vec<BuildWarning>) -> Vec<ActivityEntry> {
    let mut expanded = Vec::new();

    for activity in source {
        let students: Vec<String> = activity.student_sets().iter().map(ToString::to_string).collect();

        let reason = if activity.teacher_ids.is_empty() {
            Some("no teachers assigned")
        } else if students.is_empty() {
            Some("no students assigned")
        } else if activity.periods_per_instance == 0 || activity.total_periods == 0 {
            Some("zero duration")
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!("Activity {} skipped: {}", activity.id, reason);
            warnings.push(BuildWarning::ActivityDropped {
                activity_id: activity.id,
                reason: reason.to_string(),
            });
            continue;
        }

        for duration in split_durations(activity.total_periods, activity.periods_per_instance) {
            expanded.push(ActivityEntry {
                id: 0,
                teachers: activity.teacher_ids.iter().map(ToString::to_string).collect(),
                subject: activity.subject_id.to_string(),
                students: students.clone(),
                duration,
                total_duration: activity.total_periods,
                activity_group_id: activity.id.value(),
                active: true,
                comments: activity.id.to_string(),
            });
        }
    }

    // Ids are assigned only once the whole expansion is known.
    for (index, entry) in expanded.iter_mut().enumerate() {
        entry.id = index as u32 + 1;
    }
    expanded
}

type ConstraintSections = BTreeMap<String, Vec<ConstraintKind>>;

fn build_constraints(
    rows: &[DraftConstraint],
    warnings: &mut Vec<BuildWarning>,
) -> (ConstraintSections, ConstraintSections) {
    let mut time = ConstraintSections::new();
    let mut space = ConstraintSections::new();

    for row in rows.iter().filter(|c| c.active) {
        match row.resolve() {
            Ok(constraint) => {
                let section = match constraint.scope() {
                    ConstraintScope::Time => &mut time,
                    ConstraintScope::Space => &mut space,
                };
                section
                    .entry(constraint.canonical_name().to_string())
                    .or_default()
                    .push(constraint);
            }
            Err(e) => {
                warn!("Skipping constraint {} ({}): {}", row.id, row.canonical_name, e);
                warnings.push(BuildWarning::ConstraintSkipped {
                    constraint_id: row.id,
                    name: row.canonical_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    // The solver refuses documents without the basic compulsory constraints.
    let basic = || BasicCompulsory {
        weight_percentage: 100.0,
        active: true,
        comments: None,
    };
    time.entry(ConstraintKind::BASIC_COMPULSORY_TIME.to_string())
        .or_insert_with(|| vec![ConstraintKind::BasicCompulsoryTime(basic())]);
    space
        .entry(ConstraintKind::BASIC_COMPULSORY_SPACE.to_string())
        .or_insert_with(|| vec![ConstraintKind::BasicCompulsorySpace(basic())]);

    (time, space)
}

fn preferred_room_constraints(source: &[Activity], expanded: &[ActivityEntry]) -> Vec<ConstraintKind> {
    let mut constraints = Vec::new();

    for activity in source.iter().filter(|a| !a.preferred_rooms.is_empty()) {
        let rooms: Vec<String> = activity.preferred_rooms.iter().map(ToString::to_string).collect();
        for split in expanded
            .iter()
            .filter(|e| e.activity_group_id == activity.id.value())
        {
            constraints.push(ConstraintKind::ActivityPreferredRooms(ActivityPreferredRooms {
                weight_percentage: PREFERRED_ROOM_WEIGHT,
                activity_id: split.id,
                number_of_preferred_rooms: rooms.len() as u32,
                preferred_rooms: rooms.clone(),
                active: true,
                comments: Some(format!("Preferred rooms for activity {}", activity.id)),
            }));
        }
    }

    constraints
}

fn build_years(groups: &[StudentGroup], students: &[Student]) -> Vec<YearEntry> {
    let names: HashMap<&UserId, String> = students.iter().map(|s| (&s.id, s.display_name())).collect();
    let subgroup = |id: &UserId| SubgroupEntry {
        name: format!("S{}", id),
        comments: names.get(id).cloned().unwrap_or_default(),
    };

    let mut levels: BTreeMap<&str, (BTreeSet<&UserId>, Vec<GroupEntry>)> = BTreeMap::new();

    let mut sorted_groups: Vec<&StudentGroup> = groups.iter().collect();
    sorted_groups.sort_by_key(|g| g.id);
    for group in sorted_groups {
        let (roster, entries) = levels.entry(group.year_level.as_str()).or_default();
        roster.extend(group.members.iter());
        entries.push(GroupEntry {
            name: format!("G{}", group.id),
            number_of_students: group.members.len(),
            comments: group.name.clone(),
            subgroups: group.members.iter().map(subgroup).collect(),
        });
    }

    let mut by_year: BTreeMap<&str, Vec<&Student>> = BTreeMap::new();
    for student in students {
        by_year.entry(student.year_level.as_str()).or_default().push(student);
    }
    for (level, members) in by_year {
        let (roster, entries) = levels.entry(level).or_default();
        roster.extend(members.iter().map(|s| &s.id));
        entries.push(GroupEntry {
            name: format!("AllStudents-Y{}", level),
            number_of_students: members.len(),
            comments: format!("Year {} - All Students", level),
            subgroups: members.iter().map(|s| subgroup(&s.id)).collect(),
        });
    }

    levels
        .into_iter()
        .map(|(level, (roster, groups))| YearEntry {
            name: format!("Y{}", level),
            number_of_students: roster.len(),
            comments: format!("Year {}", level),
            groups,
        })
        .collect()
}
