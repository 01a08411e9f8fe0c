//! The solver's result document.
//!
//! A solved document repeats the input activities and adds, per placed activity, a
//! locked `ConstraintActivityPreferredStartingTime` (day and hour) and a
//! `ConstraintActivityPreferredRoom` (room). Both constraint sections may be missing
//! entirely; the activity list may not.

use std::collections::BTreeMap;
use std::str::FromStr;

use super::document::{DOCUMENT_COMMENT, SOLVER_FORMAT_VERSION};
use super::xml::{read_document, write_document, Element};
use super::{InterchangeError, InterchangeResult};
use crate::models::{DayId, PeriodId, RoomId, SolvedActivity, UNSCHEDULED};

const STARTING_TIME: &str = "ConstraintActivityPreferredStartingTime";
const ROOM_ASSIGNMENT: &str = "ConstraintActivityPreferredRoom";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultActivity {
    pub id: u32,
    pub teachers: Vec<String>,
    pub subject: String,
    pub students: Vec<String>,
    pub duration: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartingTime {
    pub activity_id: u32,
    pub day: DayId,
    pub period: PeriodId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomAssignment {
    pub activity_id: u32,
    pub room: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultDocument {
    pub activities: Vec<ResultActivity>,
    pub starting_times: Vec<StartingTime>,
    pub room_assignments: Vec<RoomAssignment>,
}

impl ResultDocument {
    /// Merge the three sections into one record per activity id.
    ///
    /// Activities the solver did not place keep [`UNSCHEDULED`] for day, period and
    /// room. Assignments that reference unknown activity ids are ignored.
    pub fn solved_activities(&self) -> Vec<SolvedActivity> {
        let mut merged: BTreeMap<u32, SolvedActivity> = self
            .activities
            .iter()
            .map(|a| {
                (
                    a.id,
                    SolvedActivity {
                        activity_id: a.id,
                        teacher_ids: a.teachers.clone(),
                        subject_id: a.subject.clone(),
                        student_ids: a.students.clone(),
                        day: DayId::new(UNSCHEDULED),
                        period: PeriodId::new(UNSCHEDULED),
                        room: RoomId::new(UNSCHEDULED),
                        duration: a.duration,
                    },
                )
            })
            .collect();

        for time in &self.starting_times {
            if let Some(activity) = merged.get_mut(&time.activity_id) {
                activity.day = time.day;
                activity.period = time.period;
            }
        }
        for assignment in &self.room_assignments {
            if let Some(activity) = merged.get_mut(&assignment.activity_id) {
                activity.room = assignment.room;
            }
        }

        merged.into_values().collect()
    }
}

fn required<'a>(element: &'a Element, name: &str) -> InterchangeResult<&'a str> {
    element
        .child_text(name)
        .ok_or_else(|| InterchangeError::MissingSection(format!("{}/{}", element.name, name)))
}

fn parse_value<T: FromStr>(element: &str, value: &str) -> InterchangeResult<T> {
    value.trim().parse().map_err(|_| InterchangeError::InvalidValue {
        element: element.to_string(),
        value: value.to_string(),
    })
}

/// First present child among `names`, for fields the solver has spelled two ways.
fn either<'a>(element: &'a Element, names: &[&str]) -> InterchangeResult<&'a str> {
    names
        .iter()
        .find_map(|n| element.child_text(n))
        .ok_or_else(|| InterchangeError::MissingSection(format!("{}/{}", element.name, names[0])))
}

/// Parse solver output text.
pub fn parse(text: &str) -> InterchangeResult<ResultDocument> {
    let root = read_document(text)?;
    if root.name != "fet" {
        return Err(InterchangeError::MissingSection("fet".to_string()));
    }

    let list = root
        .child("Activities_List")
        .ok_or_else(|| InterchangeError::MissingSection("Activities_List".to_string()))?;

    let mut document = ResultDocument::default();

    for activity in list.children_named("Activity") {
        document.activities.push(ResultActivity {
            id: parse_value("Id", required(activity, "Id")?)?,
            teachers: activity.child_texts("Teacher"),
            subject: activity.child_text("Subject").unwrap_or_default().to_string(),
            students: activity.child_texts("Students"),
            duration: parse_value("Duration", required(activity, "Duration")?)?,
        });
    }

    if let Some(section) = root.child("Time_Constraints_List") {
        for c in section.children_named(STARTING_TIME) {
            document.starting_times.push(StartingTime {
                activity_id: parse_value("Activity_Id", required(c, "Activity_Id")?)?,
                day: parse_value("Day", either(c, &["Day", "Preferred_Day"])?)?,
                period: parse_value("Hour", either(c, &["Hour", "Preferred_Hour"])?)?,
            });
        }
    }

    if let Some(section) = root.child("Space_Constraints_List") {
        for c in section.children_named(ROOM_ASSIGNMENT) {
            document.room_assignments.push(RoomAssignment {
                activity_id: parse_value("Activity_Id", required(c, "Activity_Id")?)?,
                room: parse_value("Room", required(c, "Room")?)?,
            });
        }
    }

    Ok(document)
}

/// Render a result document in the solver's output layout.
pub fn serialize_result(document: &ResultDocument) -> InterchangeResult<String> {
    let activities = Element::new("Activities_List").with_children(document.activities.iter().map(|a| {
        Element::new("Activity")
            .with_children(a.teachers.iter().map(|t| Element::leaf("Teacher", t)))
            .with_leaf("Subject", &a.subject)
            .with_children(a.students.iter().map(|s| Element::leaf("Students", s)))
            .with_leaf("Duration", a.duration)
            .with_leaf("Id", a.id)
            .with_leaf("Active", true)
    }));

    let times = Element::new("Time_Constraints_List").with_children(document.starting_times.iter().map(|t| {
        Element::new(STARTING_TIME)
            .with_leaf("Weight_Percentage", 100)
            .with_leaf("Activity_Id", t.activity_id)
            .with_leaf("Preferred_Day", t.day)
            .with_leaf("Preferred_Hour", t.period)
            .with_leaf("Permanently_Locked", true)
            .with_leaf("Active", true)
    }));

    let rooms = Element::new("Space_Constraints_List").with_children(document.room_assignments.iter().map(|r| {
        Element::new(ROOM_ASSIGNMENT)
            .with_leaf("Weight_Percentage", 100)
            .with_leaf("Activity_Id", r.activity_id)
            .with_leaf("Room", r.room)
            .with_leaf("Permanently_Locked", true)
            .with_leaf("Active", true)
    }));

    let root = Element::new("fet")
        .with_attr("version", SOLVER_FORMAT_VERSION)
        .with_leaf("Comments", DOCUMENT_COMMENT)
        .with_child(activities)
        .with_child(times)
        .with_child(rooms);

    write_document(&root)
}
