//! Shared fixtures for the integration tests: a seeded draft and a scriptable runner
//! that stands in for the solver environment.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use timetable_pipeline::db::LocalRepository;
use timetable_pipeline::interchange::result::{RoomAssignment, StartingTime};
use timetable_pipeline::interchange::{parse, serialize_result};
use timetable_pipeline::models::{
    Activity, ActivityId, Day, DayId, DraftId, GroupId, Period, PeriodId, Room, RoomId, School,
    SchoolId, Student, StudentGroup, Subject, SubjectId, Teacher, Timetable, TimetableDraft,
    TimetableId, UserId,
};
use timetable_pipeline::services::PipelineContext;
use timetable_pipeline::solver::{
    JobPaths, ProcessRunner, RunOutput, SolverError, SolverInvoker, SolverOptions, SolverResult,
};
use timetable_pipeline::storage::MemoryArtifactStore;

pub const SCHOOL: i64 = 1;
pub const TIMETABLE: i64 = 10;
pub const DRAFT: i64 = 100;

/// Period ids of the seeded draft, in time order.
pub const PERIODS: [i64; 3] = [11, 12, 13];

pub fn draft(id: i64, created_hour: u32) -> TimetableDraft {
    TimetableDraft {
        id: DraftId::new(id),
        timetable_id: TimetableId::new(TIMETABLE),
        name: format!("Draft {}", id),
        created_at: Utc
            .with_ymd_and_hms(2026, 9, 1, created_hour, 0, 0)
            .single()
            .unwrap(),
        superseded_at: None,
        error: None,
        solver_response: None,
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// One school, one timetable with a single draft: two days, three 50-minute periods
/// with a break after the second, one teacher, one group of two students and two
/// activities (3 periods in blocks of 2, and 1 period in a preferred room).
pub fn seeded_repository() -> LocalRepository {
    let repo = LocalRepository::new();
    let school_id = SchoolId::new(SCHOOL);
    let draft_id = DraftId::new(DRAFT);

    repo.insert_school(School {
        id: school_id,
        name: "Hillside".to_string(),
    });
    repo.insert_timetable(Timetable {
        id: TimetableId::new(TIMETABLE),
        school_id,
        name: "2026/27".to_string(),
    });
    repo.insert_draft(draft(DRAFT, 8));

    for (id, position) in [(1, 1), (2, 2)] {
        repo.insert_day(Day {
            id: DayId::new(id),
            draft_id,
            name: format!("Day {}", position),
            position,
        });
    }
    let slots = [(time(8, 0), time(8, 50)), (time(8, 50), time(9, 40)), (time(10, 0), time(10, 50))];
    for (index, (start, end)) in slots.into_iter().enumerate() {
        repo.insert_period(Period {
            id: PeriodId::new(PERIODS[index]),
            draft_id,
            start,
            end,
            position: index as u32 + 1,
        });
    }

    repo.insert_subject(
        school_id,
        Subject {
            id: SubjectId::new(5),
            name: "Mathematics".to_string(),
        },
    );
    repo.insert_teacher(
        school_id,
        Teacher {
            id: UserId::new("t1"),
            first_name: "Ada".to_string(),
            last_name: "Byron".to_string(),
        },
        vec![SubjectId::new(5)],
    );
    for (id, first) in [("s1", "Ben"), ("s2", "Cleo")] {
        repo.insert_student(
            school_id,
            Student {
                id: UserId::new(id),
                first_name: first.to_string(),
                last_name: "Doe".to_string(),
                year_level: "7".to_string(),
            },
        );
    }
    repo.insert_group(
        draft_id,
        StudentGroup {
            id: GroupId::new(1),
            name: "7A".to_string(),
            year_level: "7".to_string(),
            members: vec![UserId::new("s1"), UserId::new("s2")],
        },
    );
    repo.insert_room(
        school_id,
        Room {
            id: RoomId::new(9),
            name: "Lab".to_string(),
            building_id: None,
            capacity: Some(24),
        },
    );

    repo.insert_activity(activity(1, 2, 3, vec![]));
    repo.insert_activity(activity(2, 1, 1, vec![RoomId::new(9)]));
    repo
}

pub fn activity(id: i64, per_instance: u32, total: u32, preferred_rooms: Vec<RoomId>) -> Activity {
    Activity {
        id: ActivityId::new(id),
        draft_id: DraftId::new(DRAFT),
        subject_id: SubjectId::new(5),
        teacher_ids: vec![UserId::new("t1")],
        group_ids: vec![GroupId::new(1)],
        year_levels: vec![],
        student_ids: vec![],
        periods_per_instance: per_instance,
        total_periods: total,
        preferred_rooms,
    }
}

/// What the fake solver does when run.
#[derive(Clone)]
pub enum Behaviour {
    /// Place every activity of the input on day 1, consecutive periods, room 9.
    Solve,
    /// Write only a CSV export placing activity 1.
    SolveCsvOnly,
    /// Write HTML reports but no result document.
    ReportsOnly,
    /// Exit with the given code and stderr.
    Fail(i32, String),
    /// Never finish.
    Hang,
    /// Exit cleanly without writing anything.
    Silent,
}

/// In-memory stand-in for a solver environment.
///
/// Inputs and output directories live in maps so tests can check that every run
/// leaves nothing behind.
pub struct FakeRunner {
    behaviour: Mutex<Behaviour>,
    available: AtomicBool,
    inputs: Mutex<BTreeMap<String, Vec<u8>>>,
    output_dirs: Mutex<HashSet<String>>,
    outputs: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Repository taken offline while the next run executes.
    outage: Mutex<Option<Arc<LocalRepository>>>,
    pub runs: AtomicUsize,
    pub terminated: AtomicUsize,
}

impl FakeRunner {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            available: AtomicBool::new(true),
            inputs: Mutex::new(BTreeMap::new()),
            output_dirs: Mutex::new(HashSet::new()),
            outputs: Mutex::new(BTreeMap::new()),
            outage: Mutex::new(None),
            runs: AtomicUsize::new(0),
            terminated: AtomicUsize::new(0),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock() = behaviour;
    }

    /// Mark `repository` unhealthy from inside the next run.
    pub fn break_repository_during_run(&self, repository: Arc<LocalRepository>) {
        *self.outage.lock() = Some(repository);
    }

    /// Whether any input, output directory or output file is still present.
    pub fn has_leftovers(&self) -> bool {
        !self.inputs.lock().is_empty()
            || !self.output_dirs.lock().is_empty()
            || !self.outputs.lock().is_empty()
    }

    fn write_output(&self, paths: &JobPaths, name: &str, content: String) {
        self.outputs
            .lock()
            .insert(format!("{}/{}", paths.output_dir, name), content.into_bytes());
    }
}

/// The solved document the fake writes for [`Behaviour::Solve`].
fn solve(input: &[u8]) -> SolverResult<String> {
    let text = String::from_utf8_lossy(input);
    let mut document = parse(&text).map_err(|e| SolverError::Io(e.to_string()))?;
    let mut next_period = 0;
    for activity in &document.activities {
        let period = PERIODS[next_period % PERIODS.len()];
        next_period += activity.duration as usize;
        document.starting_times.push(StartingTime {
            activity_id: activity.id,
            day: DayId::new(1),
            period: PeriodId::new(period),
        });
        document.room_assignments.push(RoomAssignment {
            activity_id: activity.id,
            room: RoomId::new(9),
        });
    }
    serialize_result(&document).map_err(|e| SolverError::Io(e.to_string()))
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    fn target(&self) -> String {
        "fake solver".to_string()
    }

    fn job_paths(&self, job_id: &str, input_name: &str) -> JobPaths {
        JobPaths {
            job_id: job_id.to_string(),
            input_path: format!("/in/{}_{}", job_id, input_name),
            output_dir: format!("/out/output_{}", job_id),
        }
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn write_input(&self, paths: &JobPaths, content: &[u8]) -> SolverResult<()> {
        self.inputs
            .lock()
            .insert(paths.input_path.clone(), content.to_vec());
        Ok(())
    }

    async fn create_output_dir(&self, paths: &JobPaths) -> SolverResult<()> {
        self.output_dirs.lock().insert(paths.output_dir.clone());
        Ok(())
    }

    async fn run(&self, paths: &JobPaths, _args: &[String]) -> SolverResult<RunOutput> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(repository) = self.outage.lock().take() {
            repository.set_healthy(false);
        }
        let behaviour = self.behaviour.lock().clone();
        let input = self
            .inputs
            .lock()
            .get(&paths.input_path)
            .cloned()
            .ok_or_else(|| SolverError::Io("input missing".to_string()))?;

        match behaviour {
            Behaviour::Solve => {
                self.write_output(paths, "term_data_and_timetable.fet", solve(&input)?);
                self.write_output(paths, "term_teachers.html", "<html/>".to_string());
            }
            Behaviour::SolveCsvOnly => {
                let csv = "\"Activity Id\",\"Day\",\"Hour\",\"Students Sets\",\"Subject\",\"Teachers\",\"Activity Tags\",\"Room\",\"Comments\"\n\
                           \"1\",\"2\",\"13\",\"G1\",\"5\",\"t1\",\"\",\"9\",\"\"\n";
                self.write_output(paths, "term_timetable.csv", csv.to_string());
            }
            Behaviour::ReportsOnly => {
                self.write_output(paths, "term_teachers.html", "<html/>".to_string());
            }
            Behaviour::Fail(code, stderr) => {
                return Ok(RunOutput {
                    exit_code: Some(code),
                    stdout: String::new(),
                    stderr,
                });
            }
            Behaviour::Hang => {
                self.write_output(paths, "logs/result.txt", "Placed 2 of 3 activities".to_string());
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Behaviour::Silent => {}
        }

        Ok(RunOutput {
            exit_code: Some(0),
            stdout: "Simulation successful".to_string(),
            stderr: String::new(),
        })
    }

    async fn terminate(&self, _paths: &JobPaths) -> SolverResult<()> {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_outputs(&self, paths: &JobPaths) -> SolverResult<Vec<String>> {
        let prefix = format!("{}/", paths.output_dir);
        Ok(self
            .outputs
            .lock()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn read_output(&self, path: &str) -> SolverResult<Vec<u8>> {
        self.outputs
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| SolverError::Io(format!("{} not found", path)))
    }

    async fn remove_input(&self, paths: &JobPaths) -> SolverResult<()> {
        self.inputs.lock().remove(&paths.input_path);
        Ok(())
    }

    async fn remove_output_dir(&self, paths: &JobPaths) -> SolverResult<()> {
        let prefix = format!("{}/", paths.output_dir);
        self.outputs.lock().retain(|k, _| !k.starts_with(&prefix));
        self.output_dirs.lock().remove(&paths.output_dir);
        Ok(())
    }
}

/// A pipeline over the seeded repository, an in-memory store and `runner`.
pub fn pipeline(runner: Arc<FakeRunner>, timeout: Duration) -> (PipelineContext, Arc<LocalRepository>) {
    let repo = Arc::new(seeded_repository());
    let options = SolverOptions {
        timeout,
        ..Default::default()
    };
    let context = PipelineContext::new(
        repo.clone(),
        Arc::new(MemoryArtifactStore::new()),
        SolverInvoker::new(runner, options),
    );
    (context, repo)
}
