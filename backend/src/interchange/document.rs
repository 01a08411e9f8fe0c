//! The solver input document.

use std::collections::BTreeMap;

use super::xml::{write_document, Element};
use super::InterchangeResult;
use crate::models::ConstraintKind;

pub const SOLVER_FORMAT_VERSION: &str = "7.3.0";

pub const DOCUMENT_COMMENT: &str = "Timetable generated by the timetable pipeline. \
    Full credit goes to Liviu Lalescu and Volker Dirr for FET, the solver used to produce it.";

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherEntry {
    pub name: String,
    pub qualified_subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubgroupEntry {
    pub name: String,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub name: String,
    pub number_of_students: usize,
    pub comments: String,
    pub subgroups: Vec<SubgroupEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearEntry {
    pub name: String,
    pub number_of_students: usize,
    pub comments: String,
    pub groups: Vec<GroupEntry>,
}

/// One split instance as the solver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: u32,
    pub teachers: Vec<String>,
    pub subject: String,
    pub students: Vec<String>,
    pub duration: u32,
    pub total_duration: u32,
    /// Source activity id shared by all splits of one activity.
    pub activity_group_id: i64,
    pub active: bool,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomEntry {
    pub name: String,
    pub building: String,
    pub capacity: u32,
}

/// Fully resolved solver input.
///
/// Constraint sections are keyed by canonical name in a `BTreeMap`, so their order in
/// the rendered text does not depend on insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterchangeDocument {
    pub institution_name: String,
    pub days: Vec<String>,
    pub hours: Vec<String>,
    pub subjects: Vec<String>,
    pub teachers: Vec<TeacherEntry>,
    pub years: Vec<YearEntry>,
    pub activities: Vec<ActivityEntry>,
    pub buildings: Vec<String>,
    pub rooms: Vec<RoomEntry>,
    pub time_constraints: BTreeMap<String, Vec<ConstraintKind>>,
    pub space_constraints: BTreeMap<String, Vec<ConstraintKind>>,
}

impl InterchangeDocument {
    pub fn constraint_count(&self) -> usize {
        self.time_constraints.values().map(Vec::len).sum::<usize>()
            + self.space_constraints.values().map(Vec::len).sum::<usize>()
    }

    pub fn to_element(&self) -> Element {
        Element::new("fet")
            .with_attr("version", SOLVER_FORMAT_VERSION)
            .with_leaf("Institution_Name", &self.institution_name)
            .with_leaf("Comments", DOCUMENT_COMMENT)
            .with_child(
                Element::new("Days_List")
                    .with_leaf("Number_of_Days", self.days.len())
                    .with_children(self.days.iter().map(|d| Element::new("Day").with_leaf("Name", d))),
            )
            .with_child(
                Element::new("Hours_List")
                    .with_leaf("Number_of_Hours", self.hours.len())
                    .with_children(self.hours.iter().map(|h| Element::new("Hour").with_leaf("Name", h))),
            )
            .with_child(
                Element::new("Subjects_List").with_children(
                    self.subjects
                        .iter()
                        .map(|s| Element::new("Subject").with_leaf("Name", s)),
                ),
            )
            .with_child(Element::new("Activity_Tags_List"))
            .with_child(Element::new("Teachers_List").with_children(self.teachers.iter().map(teacher_element)))
            .with_child(Element::new("Students_List").with_children(self.years.iter().map(year_element)))
            .with_child(
                Element::new("Activities_List").with_children(self.activities.iter().map(activity_element)),
            )
            .with_child(
                Element::new("Buildings_List").with_children(
                    self.buildings
                        .iter()
                        .map(|b| Element::new("Building").with_leaf("Name", b)),
                ),
            )
            .with_child(Element::new("Rooms_List").with_children(self.rooms.iter().map(room_element)))
            .with_child(constraint_section("Time_Constraints_List", &self.time_constraints))
            .with_child(constraint_section("Space_Constraints_List", &self.space_constraints))
            .with_child(Element::new("Timetable_Generation_Options_List"))
    }
}

/// Render the document in the solver's textual format.
pub fn serialize(document: &InterchangeDocument) -> InterchangeResult<String> {
    write_document(&document.to_element())
}

fn teacher_element(teacher: &TeacherEntry) -> Element {
    let mut element = Element::new("Teacher")
        .with_leaf("Name", &teacher.name)
        .with_child(Element::new("Target_Number_of_Hours"));
    if !teacher.qualified_subjects.is_empty() {
        element.push(
            Element::new("Qualified_Subjects").with_children(
                teacher
                    .qualified_subjects
                    .iter()
                    .map(|s| Element::leaf("Qualified_Subject", s)),
            ),
        );
    }
    element
}

fn year_element(year: &YearEntry) -> Element {
    Element::new("Year")
        .with_leaf("Name", &year.name)
        .with_leaf("Number_of_Students", year.number_of_students)
        .with_leaf("Comments", &year.comments)
        .with_children(year.groups.iter().map(|group| {
            Element::new("Group")
                .with_leaf("Name", &group.name)
                .with_leaf("Number_of_Students", group.number_of_students)
                .with_leaf("Comments", &group.comments)
                .with_children(group.subgroups.iter().map(|sub| {
                    Element::new("Subgroup")
                        .with_leaf("Name", &sub.name)
                        .with_leaf("Number_of_Students", 1)
                        .with_leaf("Comments", &sub.comments)
                }))
        }))
}

fn activity_element(activity: &ActivityEntry) -> Element {
    Element::new("Activity")
        .with_children(activity.teachers.iter().map(|t| Element::leaf("Teacher", t)))
        .with_leaf("Subject", &activity.subject)
        .with_children(activity.students.iter().map(|s| Element::leaf("Students", s)))
        .with_leaf("Duration", activity.duration)
        .with_leaf("Total_Duration", activity.total_duration)
        .with_leaf("Id", activity.id)
        .with_leaf("Activity_Group_Id", activity.activity_group_id)
        .with_leaf("Active", activity.active)
        .with_leaf("Comments", &activity.comments)
}

fn room_element(room: &RoomEntry) -> Element {
    Element::new("Room")
        .with_leaf("Name", &room.name)
        .with_leaf("Building", &room.building)
        .with_leaf("Capacity", room.capacity)
        .with_leaf("Virtual", false)
}

fn constraint_section(name: &str, constraints: &BTreeMap<String, Vec<ConstraintKind>>) -> Element {
    Element::new(name).with_children(constraints.values().flatten().map(constraint_element))
}

fn common_tail(element: Element, active: bool, comments: &Option<String>) -> Element {
    element
        .with_leaf("Active", active)
        .with_leaf("Comments", comments.as_deref().unwrap_or_default())
}

/// Render one constraint with the solver's field names and order.
pub fn constraint_element(constraint: &ConstraintKind) -> Element {
    let element = Element::new(constraint.canonical_name()).with_leaf("Weight_Percentage", constraint.weight());

    match constraint {
        ConstraintKind::BasicCompulsoryTime(c) | ConstraintKind::BasicCompulsorySpace(c) => {
            common_tail(element, c.active, &c.comments)
        }
        ConstraintKind::TeachersMaxGapsPerWeek(c) => {
            common_tail(element.with_leaf("Max_Gaps", c.max_gaps), c.active, &c.comments)
        }
        ConstraintKind::MinDaysBetweenActivities(c) => common_tail(
            element
                .with_leaf("Consecutive_If_Same_Day", c.consecutive_if_same_day)
                .with_leaf("Number_of_Activities", c.number_of_activities)
                .with_children(c.activity_ids.iter().map(|id| Element::leaf("Activity_Id", id)))
                .with_leaf("MinDays", c.min_days),
            c.active,
            &c.comments,
        ),
        ConstraintKind::SubjectPreferredRooms(c) => common_tail(
            element
                .with_leaf("Subject", &c.subject)
                .with_leaf("Number_of_Preferred_Rooms", c.number_of_preferred_rooms)
                .with_children(c.preferred_rooms.iter().map(|r| Element::leaf("Preferred_Room", r))),
            c.active,
            &c.comments,
        ),
        ConstraintKind::RoomNotAvailableTimes(c) => common_tail(
            element
                .with_leaf("Room", &c.room)
                .with_leaf("Number_of_Not_Available_Times", c.number_of_not_available_times)
                .with_children(c.not_available_times.iter().map(|slot| {
                    Element::new("Not_Available_Time")
                        .with_leaf("Day", &slot.day)
                        .with_leaf("Hour", &slot.hour)
                })),
            c.active,
            &c.comments,
        ),
        ConstraintKind::ActivityPreferredRooms(c) => common_tail(
            element
                .with_leaf("Activity_Id", c.activity_id)
                .with_leaf("Number_of_Preferred_Rooms", c.number_of_preferred_rooms)
                .with_children(c.preferred_rooms.iter().map(|r| Element::leaf("Preferred_Room", r))),
            c.active,
            &c.comments,
        ),
        ConstraintKind::ActivityPreferredStartingTime(c) => common_tail(
            element
                .with_leaf("Activity_Id", c.activity_id)
                .with_leaf("Preferred_Day", &c.preferred_day)
                .with_leaf("Preferred_Hour", &c.preferred_hour)
                .with_leaf("Permanently_Locked", c.permanently_locked),
            c.active,
            &c.comments,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::constraint::TeachersMaxGapsPerWeek;

    fn sample() -> InterchangeDocument {
        let mut doc = InterchangeDocument {
            institution_name: "Northside".to_string(),
            days: vec!["1".to_string(), "2".to_string()],
            hours: vec!["10".to_string()],
            subjects: vec!["7".to_string()],
            teachers: vec![
                TeacherEntry {
                    name: "t1".to_string(),
                    qualified_subjects: vec!["7".to_string()],
                },
                TeacherEntry {
                    name: "t2".to_string(),
                    qualified_subjects: vec![],
                },
            ],
            ..Default::default()
        };
        doc.time_constraints.insert(
            ConstraintKind::TEACHERS_MAX_GAPS_PER_WEEK.to_string(),
            vec![ConstraintKind::TeachersMaxGapsPerWeek(TeachersMaxGapsPerWeek {
                weight_percentage: 90.0,
                max_gaps: 2,
                active: true,
                comments: None,
            })],
        );
        doc
    }

    #[test]
    fn sections_appear_in_solver_order() {
        let text = serialize(&sample()).unwrap();
        let order = [
            "<Days_List>",
            "<Hours_List>",
            "<Subjects_List>",
            "<Activity_Tags_List/>",
            "<Teachers_List>",
            "<Students_List/>",
            "<Activities_List/>",
            "<Buildings_List/>",
            "<Rooms_List/>",
            "<Time_Constraints_List>",
            "<Space_Constraints_List/>",
            "<Timetable_Generation_Options_List/>",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|tag| text.find(tag).unwrap_or_else(|| panic!("missing {}", tag)))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("<fet version=\"7.3.0\">"));
    }

    #[test]
    fn empty_qualification_list_is_omitted() {
        let root = sample().to_element();
        let teachers = root.child("Teachers_List").unwrap();
        let with: Vec<_> = teachers.children_named("Teacher").collect();
        assert!(with[0].child("Qualified_Subjects").is_some());
        assert!(with[1].child("Qualified_Subjects").is_none());
    }

    #[test]
    fn constraint_fields_use_solver_names() {
        let root = sample().to_element();
        let gaps = root
            .child("Time_Constraints_List")
            .and_then(|s| s.child("ConstraintTeachersMaxGapsPerWeek"))
            .unwrap();
        assert_eq!(gaps.child_text("Weight_Percentage"), Some("90"));
        assert_eq!(gaps.child_text("Max_Gaps"), Some("2"));
        assert_eq!(gaps.child_text("Active"), Some("true"));
    }
}
