//! In-memory local repository implementation.
//!
//! All data lives behind one `parking_lot::RwLock`, so every trait method observes and
//! mutates a consistent snapshot. Queue claims and result replacement each run under a
//! single write guard, which is what makes them atomic.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::db::repository::*;
use crate::models::*;

/// In-memory repository.
///
/// Seed helpers (`insert_*`) stand in for the CRUD surface of the wider platform.
///
/// # Example
/// ```
/// use timetable_pipeline::db::repositories::LocalRepository;
/// use timetable_pipeline::db::repository::TimetableRepository;
/// use timetable_pipeline::models::{School, SchoolId};
///
/// let repo = LocalRepository::new();
/// repo.insert_school(School { id: SchoolId::new(1), name: "Northside".into() });
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let school = rt.block_on(repo.get_school(SchoolId::new(1))).unwrap();
/// assert_eq!(school.name, "Northside");
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    schools: HashMap<SchoolId, School>,
    timetables: HashMap<TimetableId, Timetable>,
    drafts: BTreeMap<DraftId, TimetableDraft>,

    days: HashMap<DraftId, Vec<Day>>,
    periods: HashMap<DraftId, Vec<Period>>,
    activities: HashMap<DraftId, Vec<Activity>>,
    groups: HashMap<DraftId, Vec<StudentGroup>>,
    constraints: BTreeMap<ConstraintId, DraftConstraint>,

    subjects: HashMap<SchoolId, Vec<Subject>>,
    teachers: HashMap<SchoolId, Vec<Teacher>>,
    qualifications: HashMap<SchoolId, HashMap<UserId, Vec<SubjectId>>>,
    students: HashMap<SchoolId, Vec<Student>>,
    buildings: HashMap<SchoolId, Vec<Building>>,
    rooms: HashMap<SchoolId, Vec<Room>>,

    queue: BTreeMap<QueueEntryId, QueueEntry>,
    solved: HashMap<DraftId, Vec<SolvedActivity>>,

    next_constraint_id: i64,
    next_queue_id: i64,

    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            schools: HashMap::new(),
            timetables: HashMap::new(),
            drafts: BTreeMap::new(),
            days: HashMap::new(),
            periods: HashMap::new(),
            activities: HashMap::new(),
            groups: HashMap::new(),
            constraints: BTreeMap::new(),
            subjects: HashMap::new(),
            teachers: HashMap::new(),
            qualifications: HashMap::new(),
            students: HashMap::new(),
            buildings: HashMap::new(),
            rooms: HashMap::new(),
            queue: BTreeMap::new(),
            solved: HashMap::new(),
            next_constraint_id: 1,
            next_queue_id: 1,
            is_healthy: true,
        }
    }
}

fn not_found(entity: &str, id: impl ToString, operation: &str) -> RepositoryError {
    let id = id.to_string();
    RepositoryError::not_found_with_context(
        format!("{} {} not found", entity, id),
        ErrorContext::new(operation)
            .with_entity(entity)
            .with_entity_id(id),
    )
}

impl LocalRepository {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        let data = self.data.read();
        if !data.is_healthy {
            return Err(RepositoryError::connection("Repository is not healthy"));
        }
        Ok(data)
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        let data = self.data.write();
        if !data.is_healthy {
            return Err(RepositoryError::connection("Repository is not healthy"));
        }
        Ok(data)
    }

    // ==================== Seed helpers ====================

    pub fn insert_school(&self, school: School) {
        self.data.write().schools.insert(school.id, school);
    }

    pub fn insert_timetable(&self, timetable: Timetable) {
        self.data.write().timetables.insert(timetable.id, timetable);
    }

    pub fn insert_draft(&self, draft: TimetableDraft) {
        self.data.write().drafts.insert(draft.id, draft);
    }

    pub fn insert_day(&self, day: Day) {
        self.data.write().days.entry(day.draft_id).or_default().push(day);
    }

    pub fn insert_period(&self, period: Period) {
        self.data
            .write()
            .periods
            .entry(period.draft_id)
            .or_default()
            .push(period);
    }

    pub fn insert_activity(&self, activity: Activity) {
        self.data
            .write()
            .activities
            .entry(activity.draft_id)
            .or_default()
            .push(activity);
    }

    pub fn insert_group(&self, draft_id: DraftId, group: StudentGroup) {
        self.data.write().groups.entry(draft_id).or_default().push(group);
    }

    pub fn insert_subject(&self, school_id: SchoolId, subject: Subject) {
        self.data.write().subjects.entry(school_id).or_default().push(subject);
    }

    pub fn insert_teacher(&self, school_id: SchoolId, teacher: Teacher, qualified: Vec<SubjectId>) {
        let mut data = self.data.write();
        if !qualified.is_empty() {
            data.qualifications
                .entry(school_id)
                .or_default()
                .insert(teacher.id.clone(), qualified);
        }
        data.teachers.entry(school_id).or_default().push(teacher);
    }

    pub fn insert_student(&self, school_id: SchoolId, student: Student) {
        self.data.write().students.entry(school_id).or_default().push(student);
    }

    pub fn insert_building(&self, school_id: SchoolId, building: Building) {
        self.data.write().buildings.entry(school_id).or_default().push(building);
    }

    pub fn insert_room(&self, school_id: SchoolId, room: Room) {
        self.data.write().rooms.entry(school_id).or_default().push(room);
    }

    /// Number of queue entries currently `inProgress`.
    pub fn in_progress_count(&self) -> usize {
        self.data
            .read()
            .queue
            .values()
            .filter(|e| e.status == QueueStatus::InProgress)
            .count()
    }

    fn transition(
        &self,
        entry_id: QueueEntryId,
        next: QueueStatus,
        diagnostics: Option<String>,
        operation: &str,
    ) -> RepositoryResult<QueueEntry> {
        let mut data = self.write()?;
        let entry = data
            .queue
            .get_mut(&entry_id)
            .ok_or_else(|| not_found("queue_entry", entry_id, operation))?;

        if !entry.status.can_transition_to(next) {
            return Err(RepositoryError::conflict_with_context(
                format!("Cannot move queue entry from {} to {}", entry.status, next),
                ErrorContext::new(operation)
                    .with_entity("queue_entry")
                    .with_entity_id(entry_id),
            ));
        }

        entry.status = next;
        entry.completed_at = Some(Utc::now());
        if diagnostics.is_some() {
            entry.diagnostics = diagnostics;
        }
        Ok(entry.clone())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn school_scoped<T: Clone>(map: &HashMap<SchoolId, Vec<T>>, school_id: SchoolId) -> Vec<T> {
    map.get(&school_id).cloned().unwrap_or_default()
}

fn draft_scoped<T: Clone>(map: &HashMap<DraftId, Vec<T>>, draft_id: DraftId) -> Vec<T> {
    map.get(&draft_id).cloned().unwrap_or_default()
}

#[async_trait]
impl TimetableRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn get_school(&self, school_id: SchoolId) -> RepositoryResult<School> {
        self.read()?
            .schools
            .get(&school_id)
            .cloned()
            .ok_or_else(|| not_found("school", school_id, "get_school"))
    }

    async fn get_timetable(&self, timetable_id: TimetableId) -> RepositoryResult<Timetable> {
        self.read()?
            .timetables
            .get(&timetable_id)
            .cloned()
            .ok_or_else(|| not_found("timetable", timetable_id, "get_timetable"))
    }

    async fn get_draft(&self, draft_id: DraftId) -> RepositoryResult<TimetableDraft> {
        self.read()?
            .drafts
            .get(&draft_id)
            .cloned()
            .ok_or_else(|| not_found("draft", draft_id, "get_draft"))
    }

    async fn list_drafts(&self, timetable_id: TimetableId) -> RepositoryResult<Vec<TimetableDraft>> {
        let data = self.read()?;
        let mut drafts: Vec<TimetableDraft> = data
            .drafts
            .values()
            .filter(|d| d.timetable_id == timetable_id)
            .cloned()
            .collect();
        drafts.sort_by_key(|d| (d.created_at, d.id));
        Ok(drafts)
    }

    async fn current_draft(&self, timetable_id: TimetableId) -> RepositoryResult<TimetableDraft> {
        let data = self.read()?;
        data.drafts
            .values()
            .filter(|d| d.timetable_id == timetable_id && !d.is_superseded())
            .max_by_key(|d| (d.created_at, d.id))
            .cloned()
            .ok_or_else(|| not_found("current draft of timetable", timetable_id, "current_draft"))
    }

    async fn list_days(&self, draft_id: DraftId) -> RepositoryResult<Vec<Day>> {
        Ok(draft_scoped(&self.read()?.days, draft_id))
    }

    async fn list_periods(&self, draft_id: DraftId) -> RepositoryResult<Vec<Period>> {
        Ok(draft_scoped(&self.read()?.periods, draft_id))
    }

    async fn list_activities(&self, draft_id: DraftId) -> RepositoryResult<Vec<Activity>> {
        Ok(draft_scoped(&self.read()?.activities, draft_id))
    }

    async fn list_groups(&self, draft_id: DraftId) -> RepositoryResult<Vec<StudentGroup>> {
        Ok(draft_scoped(&self.read()?.groups, draft_id))
    }

    async fn list_subjects(&self, school_id: SchoolId) -> RepositoryResult<Vec<Subject>> {
        Ok(school_scoped(&self.read()?.subjects, school_id))
    }

    async fn list_teachers(&self, school_id: SchoolId) -> RepositoryResult<Vec<Teacher>> {
        Ok(school_scoped(&self.read()?.teachers, school_id))
    }

    async fn teacher_qualifications(
        &self,
        school_id: SchoolId,
    ) -> RepositoryResult<HashMap<UserId, Vec<SubjectId>>> {
        Ok(self
            .read()?
            .qualifications
            .get(&school_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_students(&self, school_id: SchoolId) -> RepositoryResult<Vec<Student>> {
        Ok(school_scoped(&self.read()?.students, school_id))
    }

    async fn list_buildings(&self, school_id: SchoolId) -> RepositoryResult<Vec<Building>> {
        Ok(school_scoped(&self.read()?.buildings, school_id))
    }

    async fn list_rooms(&self, school_id: SchoolId) -> RepositoryResult<Vec<Room>> {
        Ok(school_scoped(&self.read()?.rooms, school_id))
    }

    async fn list_constraints(&self, draft_id: DraftId) -> RepositoryResult<Vec<DraftConstraint>> {
        Ok(self
            .read()?
            .constraints
            .values()
            .filter(|c| c.draft_id == draft_id)
            .cloned()
            .collect())
    }

    async fn add_constraint(&self, constraint: NewConstraint) -> RepositoryResult<DraftConstraint> {
        let mut data = self.write()?;
        if !data.drafts.contains_key(&constraint.draft_id) {
            return Err(not_found("draft", constraint.draft_id, "add_constraint"));
        }

        let id = ConstraintId::new(data.next_constraint_id);
        data.next_constraint_id += 1;

        let row = DraftConstraint {
            id,
            draft_id: constraint.draft_id,
            canonical_name: constraint.canonical_name,
            scope: constraint.scope,
            active: constraint.active,
            parameters: constraint.parameters,
        };
        data.constraints.insert(id, row.clone());
        Ok(row)
    }

    async fn set_constraint_active(
        &self,
        draft_id: DraftId,
        constraint_id: ConstraintId,
        active: bool,
    ) -> RepositoryResult<DraftConstraint> {
        let mut data = self.write()?;
        let row = data
            .constraints
            .get_mut(&constraint_id)
            .filter(|c| c.draft_id == draft_id)
            .ok_or_else(|| not_found("constraint", constraint_id, "set_constraint_active"))?;
        row.active = active;
        Ok(row.clone())
    }

    async fn record_draft_error(
        &self,
        draft_id: DraftId,
        error: Option<String>,
        solver_response: Option<String>,
    ) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let draft = data
            .drafts
            .get_mut(&draft_id)
            .ok_or_else(|| not_found("draft", draft_id, "record_draft_error"))?;
        draft.error = error;
        draft.solver_response = solver_response;
        Ok(())
    }

    async fn supersede_other_drafts(
        &self,
        timetable_id: TimetableId,
        keep: DraftId,
    ) -> RepositoryResult<usize> {
        let mut data = self.write()?;
        let now = Utc::now();
        let mut count = 0;
        for draft in data.drafts.values_mut() {
            if draft.timetable_id == timetable_id && draft.id != keep && !draft.is_superseded() {
                draft.superseded_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl QueueRepository for LocalRepository {
    async fn enqueue(&self, entry: NewQueueEntry) -> RepositoryResult<QueueEntry> {
        let mut data = self.write()?;
        let id = QueueEntryId::new(data.next_queue_id);
        data.next_queue_id += 1;

        let entry = QueueEntry::from_new(id, entry, Utc::now());
        data.queue.insert(id, entry.clone());
        Ok(entry)
    }

    async fn claim_next(&self) -> RepositoryResult<ClaimOutcome> {
        let mut data = self.write()?;

        if let Some(running) = data
            .queue
            .values()
            .find(|e| e.status == QueueStatus::InProgress)
        {
            return Ok(ClaimOutcome::Busy(running.id));
        }

        let next_id = data
            .queue
            .values()
            .filter(|e| e.status == QueueStatus::Queued)
            .min_by_key(|e| (e.submitted_at, e.id))
            .map(|e| e.id);

        let Some(id) = next_id else {
            return Ok(ClaimOutcome::Empty);
        };

        let entry = data
            .queue
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::internal(format!("Queue entry {} vanished while claimed", id)))?;
        entry.status = QueueStatus::InProgress;
        entry.started_at = Some(Utc::now());
        Ok(ClaimOutcome::Claimed(entry.clone()))
    }

    async fn complete(&self, entry_id: QueueEntryId) -> RepositoryResult<QueueEntry> {
        self.transition(entry_id, QueueStatus::Completed, None, "complete")
    }

    async fn fail(&self, entry_id: QueueEntryId, diagnostics: String) -> RepositoryResult<QueueEntry> {
        self.transition(entry_id, QueueStatus::Failed, Some(diagnostics), "fail")
    }

    async fn get_queue_entry(&self, entry_id: QueueEntryId) -> RepositoryResult<QueueEntry> {
        self.read()?
            .queue
            .get(&entry_id)
            .cloned()
            .ok_or_else(|| not_found("queue_entry", entry_id, "get_queue_entry"))
    }

    async fn list_queue_entries(&self, timetable_id: TimetableId) -> RepositoryResult<Vec<QueueEntry>> {
        let data = self.read()?;
        let mut entries: Vec<QueueEntry> = data
            .queue
            .values()
            .filter(|e| e.timetable_id == timetable_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.submitted_at, e.id));
        Ok(entries)
    }

    async fn in_progress(&self) -> RepositoryResult<Option<QueueEntry>> {
        Ok(self
            .read()?
            .queue
            .values()
            .find(|e| e.status == QueueStatus::InProgress)
            .cloned())
    }
}

#[async_trait]
impl ResultRepository for LocalRepository {
    async fn replace_solved_activities(
        &self,
        draft_id: DraftId,
        activities: Vec<SolvedActivity>,
    ) -> RepositoryResult<usize> {
        let mut seen = HashSet::new();
        if let Some(dup) = activities.iter().find(|a| !seen.insert(a.activity_id)) {
            return Err(RepositoryError::validation_with_context(
                format!("Duplicate activity id {} in result set", dup.activity_id),
                ErrorContext::new("replace_solved_activities")
                    .with_entity("draft")
                    .with_entity_id(draft_id),
            ));
        }

        let mut data = self.write()?;
        if !data.drafts.contains_key(&draft_id) {
            return Err(not_found("draft", draft_id, "replace_solved_activities"));
        }

        let mut rows = activities;
        rows.sort_by_key(|a| a.activity_id);
        let count = rows.len();
        data.solved.insert(draft_id, rows);
        Ok(count)
    }

    async fn list_solved_activities(&self, draft_id: DraftId) -> RepositoryResult<Vec<SolvedActivity>> {
        Ok(draft_scoped(&self.read()?.solved, draft_id))
    }
}
