//! Interchange builder and result document tests against a seeded draft.

mod support;

use proptest::prelude::*;

use support::{seeded_repository, DRAFT};
use timetable_pipeline::db::load_draft_snapshot;
use timetable_pipeline::interchange::builder::split_durations;
use timetable_pipeline::interchange::result::{ResultActivity, RoomAssignment, StartingTime};
use timetable_pipeline::interchange::{
    build_document, parse, serialize, serialize_result, BuildWarning, ResultDocument,
};
use timetable_pipeline::models::{ActivityId, DayId, DraftId, PeriodId, RoomId};

proptest! {
    #[test]
    fn split_durations_sum_to_total(total in 1u32..200, per_instance in 1u32..12) {
        let splits = split_durations(total, per_instance);
        prop_assert_eq!(splits.iter().sum::<u32>(), total);
        prop_assert_eq!(splits.len() as u32, total.div_ceil(per_instance));
        prop_assert!(splits.iter().all(|&d| d >= 1 && d <= per_instance));
        prop_assert!(splits[..splits.len() - 1].iter().all(|&d| d == per_instance));
    }
}

#[test]
fn test_split_durations_degenerate_inputs() {
    assert!(split_durations(0, 2).is_empty());
    assert!(split_durations(5, 0).is_empty());
    assert_eq!(split_durations(5, 2), vec![2, 2, 1]);
    assert_eq!(split_durations(4, 2), vec![2, 2]);
    assert_eq!(split_durations(1, 3), vec![1]);
}

#[tokio::test]
async fn test_same_snapshot_serializes_identically() {
    let repo = seeded_repository();
    let first = load_draft_snapshot(&repo, DraftId::new(DRAFT)).await.unwrap();
    let second = load_draft_snapshot(&repo, DraftId::new(DRAFT)).await.unwrap();

    let a = serialize(&build_document(&first).unwrap().document).unwrap();
    let b = serialize(&build_document(&second).unwrap().document).unwrap();
    assert_eq!(a, b);
    assert!(a.contains("<fet version="));
}

#[tokio::test]
async fn test_document_expands_and_numbers_activities() {
    let repo = seeded_repository();
    let snapshot = load_draft_snapshot(&repo, DraftId::new(DRAFT)).await.unwrap();
    let outcome = build_document(&snapshot).unwrap();
    let document = outcome.document;

    let ids: Vec<u32> = document.activities.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let durations: Vec<u32> = document.activities.iter().map(|a| a.duration).collect();
    assert_eq!(durations, vec![2, 1, 1]);
    assert!(document.activities.iter().all(|a| a.students == vec!["G1".to_string()]));

    assert_eq!(document.days, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(document.hours, vec!["11".to_string(), "12".to_string(), "13".to_string()]);
    assert_eq!(document.rooms[0].capacity, 24);

    // Basic compulsory constraints are always present; activity 2 gets a preferred room.
    assert!(document
        .time_constraints
        .contains_key("ConstraintBasicCompulsoryTime"));
    assert!(document
        .space_constraints
        .contains_key("ConstraintBasicCompulsorySpace"));
    assert_eq!(
        document.space_constraints["ConstraintActivityPreferredRooms"].len(),
        1
    );
}

#[tokio::test]
async fn test_activities_without_teachers_are_dropped_with_warning() {
    let repo = seeded_repository();
    let mut orphan = support::activity(3, 1, 2, vec![]);
    orphan.teacher_ids.clear();
    repo.insert_activity(orphan);

    let snapshot = load_draft_snapshot(&repo, DraftId::new(DRAFT)).await.unwrap();
    let outcome = build_document(&snapshot).unwrap();

    assert_eq!(outcome.document.activities.len(), 3);
    assert_eq!(
        outcome.warnings,
        vec![BuildWarning::ActivityDropped {
            activity_id: ActivityId::new(3),
            reason: "no teachers assigned".to_string(),
        }]
    );
}

#[test]
fn test_result_document_round_trip() {
    let document = ResultDocument {
        activities: vec![
            ResultActivity {
                id: 1,
                teachers: vec!["t1".to_string()],
                subject: "5".to_string(),
                students: vec!["G1".to_string(), "S9".to_string()],
                duration: 2,
            },
            ResultActivity {
                id: 2,
                teachers: vec!["t1".to_string(), "t2".to_string()],
                subject: "5".to_string(),
                students: vec!["Y7".to_string()],
                duration: 1,
            },
        ],
        starting_times: vec![StartingTime {
            activity_id: 1,
            day: DayId::new(3),
            period: PeriodId::new(12),
        }],
        room_assignments: vec![RoomAssignment {
            activity_id: 1,
            room: RoomId::new(9),
        }],
    };

    let text = serialize_result(&document).unwrap();
    let parsed = parse(&text).unwrap();
    assert_eq!(parsed, document);

    let solved = parsed.solved_activities();
    assert!(solved[0].is_scheduled());
    assert!(!solved[1].is_scheduled());
    assert!(!solved[1].has_room());
}

#[test]
fn test_result_without_constraint_sections_is_unscheduled() {
    let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<fet version="7.3.0">
  <Activities_List>
    <Activity><Teacher>t1</Teacher><Subject>5</Subject><Students>G1</Students><Duration>1</Duration><Id>4</Id></Activity>
  </Activities_List>
</fet>"#;
    let solved = parse(text).unwrap().solved_activities();
    assert_eq!(solved.len(), 1);
    assert_eq!(solved[0].activity_id, 4);
    assert!(!solved[0].is_scheduled());
}
