//! Statistics Aggregator.
//!
//! Per-person load derived from a draft's solved activities. Nothing here is stored;
//! the figures are recomputed from the imported rows on every request.
//!
//! Average, maximum and minimum are taken over the days a person actually has
//! something scheduled, so free days lower neither the average nor the minimum.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::error::{PipelineError, PipelineResult};
use crate::db::load_calendar;
use crate::db::repository::FullRepository;
use crate::models::{
    ordered_periods, Day, DayId, DraftId, Period, PeriodId, SolvedActivity, Student,
    StudentGroup, StudentSet, Teacher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Teacher,
    Student,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayLoad {
    pub day: DayId,
    pub duration: u32,
    pub minutes: i64,
}

/// Aggregate of one person's per-day durations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub total_duration: u32,
    pub busy_days: usize,
    pub free_days: usize,
    pub average_per_busy_day: f64,
    pub max_per_day: u32,
    pub min_per_day: u32,
}

impl LoadSummary {
    pub fn from_daily(durations: &[u32]) -> Self {
        let busy: Vec<u32> = durations.iter().copied().filter(|d| *d > 0).collect();
        let total: u32 = busy.iter().sum();
        let average = if busy.is_empty() {
            0.0
        } else {
            f64::from(total) / busy.len() as f64
        };
        Self {
            total_duration: total,
            busy_days: busy.len(),
            free_days: durations.len() - busy.len(),
            average_per_busy_day: average,
            max_per_day: busy.iter().copied().max().unwrap_or(0),
            min_per_day: busy.iter().copied().min().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonLoad {
    pub person_id: String,
    pub name: Option<String>,
    pub kind: PersonKind,
    #[serde(flatten)]
    pub summary: LoadSummary,
    pub total_minutes: i64,
    pub daily: Vec<DayLoad>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftStatistics {
    pub draft_id: Option<DraftId>,
    pub total_days: usize,
    pub scheduled_activities: usize,
    pub unscheduled_activities: usize,
    pub teachers: Vec<PersonLoad>,
    pub students: Vec<PersonLoad>,
}

/// Resolves the student sets named in solved activities to individual students.
#[derive(Debug, Default)]
pub struct StudentDirectory {
    groups: HashMap<String, Vec<String>>,
    years: HashMap<String, Vec<String>>,
    names: HashMap<String, String>,
}

impl StudentDirectory {
    pub fn new(groups: &[StudentGroup], students: &[Student]) -> Self {
        let mut directory = Self::default();
        for student in students {
            directory
                .years
                .entry(student.year_level.clone())
                .or_default()
                .push(student.id.to_string());
            directory
                .names
                .insert(student.id.to_string(), student.display_name());
        }
        for group in groups {
            let members: Vec<String> = group.members.iter().map(ToString::to_string).collect();
            let year = directory.years.entry(group.year_level.clone()).or_default();
            for member in &members {
                if !year.contains(member) {
                    year.push(member.clone());
                }
            }
            directory.groups.insert(group.id.to_string(), members);
        }
        directory
    }

    /// Student ids covered by one solver student identifier.
    pub fn resolve(&self, identifier: &str) -> Vec<String> {
        let identifier = identifier.trim();
        if let Some(level) = identifier.strip_prefix("AllStudents-Y") {
            return self.years.get(level).cloned().unwrap_or_default();
        }
        match identifier.parse::<StudentSet>() {
            Ok(StudentSet::Group(id)) => self.groups.get(&id.to_string()).cloned().unwrap_or_default(),
            Ok(StudentSet::Year(level)) => self.years.get(&level).cloned().unwrap_or_default(),
            Ok(StudentSet::Student(id)) => vec![id.to_string()],
            Err(_) => {
                debug!("Unknown student set {:?} in solved activity", identifier);
                Vec::new()
            }
        }
    }

    pub fn name(&self, student_id: &str) -> Option<String> {
        self.names.get(student_id).cloned()
    }
}

/// Minutes covered by `duration` consecutive periods starting at `start`.
fn covered_minutes(chain: &[Period], start: PeriodId, duration: u32) -> i64 {
    let Some(first) = chain.iter().position(|p| p.id == start) else {
        return 0;
    };
    let last = (first + duration.max(1) as usize - 1).min(chain.len() - 1);
    (chain[last].end - chain[first].start).num_minutes()
}

#[derive(Default)]
struct Accumulator {
    durations: BTreeMap<DayId, u32>,
    minutes: BTreeMap<DayId, i64>,
}

fn person_load(
    person_id: String,
    name: Option<String>,
    kind: PersonKind,
    acc: &Accumulator,
    days: &[Day],
) -> PersonLoad {
    let daily: Vec<DayLoad> = days
        .iter()
        .map(|day| DayLoad {
            day: day.id,
            duration: acc.durations.get(&day.id).copied().unwrap_or(0),
            minutes: acc.minutes.get(&day.id).copied().unwrap_or(0),
        })
        .collect();
    let durations: Vec<u32> = daily.iter().map(|d| d.duration).collect();
    PersonLoad {
        person_id,
        name,
        kind,
        summary: LoadSummary::from_daily(&durations),
        total_minutes: daily.iter().map(|d| d.minutes).sum(),
        daily,
    }
}

/// Compute per-person load over the cycle described by `days` and `periods`.
pub fn compute_statistics(
    days: &[Day],
    periods: &[Period],
    solved: &[SolvedActivity],
    teachers: &[Teacher],
    directory: &StudentDirectory,
) -> PipelineResult<DraftStatistics> {
    let mut days = days.to_vec();
    days.sort_by_key(|d| (d.position, d.id));
    let chain = ordered_periods(periods).map_err(PipelineError::Validation)?;
    let known_days: BTreeSet<DayId> = days.iter().map(|d| d.id).collect();

    let mut teacher_acc: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut student_acc: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut scheduled = 0;

    for activity in solved {
        if !activity.is_scheduled() || !known_days.contains(&activity.day) {
            continue;
        }
        scheduled += 1;
        let minutes = covered_minutes(&chain, activity.period, activity.duration);

        let mut add = |acc: &mut Accumulator| {
            *acc.durations.entry(activity.day).or_default() += activity.duration;
            *acc.minutes.entry(activity.day).or_default() += minutes;
        };

        let teacher_ids: BTreeSet<&String> = activity.teacher_ids.iter().collect();
        for teacher in teacher_ids {
            add(teacher_acc.entry(teacher.clone()).or_default());
        }

        let students: BTreeSet<String> = activity
            .student_ids
            .iter()
            .flat_map(|set| directory.resolve(set))
            .collect();
        for student in students {
            add(student_acc.entry(student).or_default());
        }
    }

    let teacher_names: HashMap<String, String> = teachers
        .iter()
        .map(|t| (t.id.to_string(), format!("{} {}", t.first_name, t.last_name)))
        .collect();

    Ok(DraftStatistics {
        draft_id: days.first().map(|d| d.draft_id),
        total_days: days.len(),
        scheduled_activities: scheduled,
        unscheduled_activities: solved.len() - scheduled,
        teachers: teacher_acc
            .iter()
            .map(|(id, acc)| {
                person_load(id.clone(), teacher_names.get(id).cloned(), PersonKind::Teacher, acc, &days)
            })
            .collect(),
        students: student_acc
            .iter()
            .map(|(id, acc)| person_load(id.clone(), directory.name(id), PersonKind::Student, acc, &days))
            .collect(),
    })
}

#[derive(Clone)]
pub struct StatisticsService {
    repository: Arc<dyn FullRepository>,
}

impl StatisticsService {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }

    pub async fn for_draft(&self, draft_id: DraftId) -> PipelineResult<DraftStatistics> {
        let draft = self.repository.get_draft(draft_id).await?;
        let timetable = self.repository.get_timetable(draft.timetable_id).await?;
        let (days, periods) = load_calendar(self.repository.as_ref(), draft_id).await?;
        let solved = self.repository.list_solved_activities(draft_id).await?;
        let teachers = self.repository.list_teachers(timetable.school_id).await?;
        let groups = self.repository.list_groups(draft_id).await?;
        let students = self.repository.list_students(timetable.school_id).await?;

        let directory = StudentDirectory::new(&groups, &students);
        let mut stats = compute_statistics(&days, &periods, &solved, &teachers, &directory)?;
        stats.draft_id = Some(draft_id);
        Ok(stats)
    }
}
