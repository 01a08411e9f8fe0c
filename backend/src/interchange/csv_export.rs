//! Reader for the solver's `*_timetable.csv` export.
//!
//! The export has one row per occupied hour, so an activity of duration 3 appears on
//! three rows. The first row of an activity carries its starting day and hour.

use std::collections::BTreeMap;

use super::{InterchangeError, InterchangeResult};
use crate::models::{DayId, PeriodId, RoomId, SolvedActivity, UNSCHEDULED};

const REQUIRED_COLUMNS: [&str; 7] = [
    "Activity Id",
    "Day",
    "Hour",
    "Students Sets",
    "Subject",
    "Teachers",
    "Room",
];

fn split_list(value: &str) -> Vec<String> {
    value
        .split('+')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn id_or_unscheduled(value: &str) -> i64 {
    value.trim().parse().unwrap_or(UNSCHEDULED)
}

/// Parse a timetable export into one [`SolvedActivity`] per activity id.
pub fn parse_timetable_csv(text: &str) -> InterchangeResult<Vec<SolvedActivity>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(rename = "Activity Id")]
        activity_id: String,
        #[serde(rename = "Day")]
        day: String,
        #[serde(rename = "Hour")]
        hour: String,
        #[serde(rename = "Students Sets")]
        students: String,
        #[serde(rename = "Subject")]
        subject: String,
        #[serde(rename = "Teachers")]
        teachers: String,
        #[serde(rename = "Room")]
        room: String,
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| InterchangeError::Csv(e.to_string()))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(InterchangeError::Csv(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut activities: BTreeMap<u32, SolvedActivity> = BTreeMap::new();

    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| InterchangeError::Csv(e.to_string()))?;
        if row.activity_id.is_empty() {
            continue;
        }
        let activity_id: u32 = row.activity_id.parse().map_err(|_| InterchangeError::InvalidValue {
            element: "Activity Id".to_string(),
            value: row.activity_id.clone(),
        })?;

        activities
            .entry(activity_id)
            .and_modify(|a| a.duration += 1)
            .or_insert_with(|| SolvedActivity {
                activity_id,
                teacher_ids: split_list(&row.teachers),
                subject_id: row.subject.clone(),
                student_ids: split_list(&row.students),
                day: DayId::new(id_or_unscheduled(&row.day)),
                period: PeriodId::new(id_or_unscheduled(&row.hour)),
                room: RoomId::new(id_or_unscheduled(&row.room)),
                duration: 1,
            });
    }

    if activities.is_empty() {
        return Err(InterchangeError::Csv("export contains no activities".to_string()));
    }

    Ok(activities.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\"Activity Id\",\"Day\",\"Hour\",\"Students Sets\",\"Subject\",\"Teachers\",\"Activity Tags\",\"Room\",\"Comments\"
\"1\",\"2\",\"10\",\"G3+Y9\",\"7\",\"t1+t2\",\"\",\"12\",\"\"
\"1\",\"2\",\"11\",\"G3+Y9\",\"7\",\"t1+t2\",\"\",\"12\",\"\"
\"2\",\"3\",\"10\",\"Sx\",\"8\",\"t3\",\"\",\"\",\"\"
";

    #[test]
    fn rows_of_one_activity_collapse_into_duration() {
        let solved = parse_timetable_csv(EXPORT).unwrap();
        assert_eq!(solved.len(), 2);

        let first = &solved[0];
        assert_eq!(first.activity_id, 1);
        assert_eq!(first.duration, 2);
        assert_eq!(first.day, DayId::new(2));
        assert_eq!(first.period, PeriodId::new(10));
        assert_eq!(first.room, RoomId::new(12));
        assert_eq!(first.teacher_ids, vec!["t1", "t2"]);
        assert_eq!(first.student_ids, vec!["G3", "Y9"]);

        assert!(!solved[1].has_room());
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = parse_timetable_csv("Activity Id,Day\n1,2\n").unwrap_err();
        assert!(err.to_string().contains("Hour"));
    }
}
