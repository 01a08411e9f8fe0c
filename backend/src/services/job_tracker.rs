//! Progress logs for generation jobs.
//!
//! Each queue entry gets a job record when it is submitted. The worker appends
//! timestamped entries while it runs the solver and imports the results, and the HTTP
//! layer streams them to operators. Records live in memory only; the queue entry in the
//! repository stays the source of truth for job state.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::QueueEntryId;

/// A single log entry with timestamp and message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub entry_id: QueueEntryId,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Summary of a finished job (output files, imported rows).
    pub result: Option<serde_json::Value>,
}

/// In-memory job tracker.
#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<QueueEntryId, Job>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly queued entry. Existing logs are kept.
    pub fn track(&self, entry_id: QueueEntryId) {
        self.jobs.write().entry(entry_id).or_insert_with(|| Job {
            entry_id,
            status: JobStatus::Queued,
            logs: vec![],
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        });
    }

    /// Mark a job as picked up by the worker, tracking it if it was not yet known.
    pub fn start(&self, entry_id: QueueEntryId) {
        self.track(entry_id);
        if let Some(job) = self.jobs.write().get_mut(&entry_id) {
            job.status = JobStatus::Running;
        }
    }

    pub fn log(&self, entry_id: QueueEntryId, level: LogLevel, message: impl Into<String>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&entry_id) {
            job.logs.push(LogEntry {
                timestamp: Utc::now(),
                level,
                message: message.into(),
            });
        }
    }

    pub fn complete_job(&self, entry_id: QueueEntryId, result: Option<serde_json::Value>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&entry_id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.result = result;
        }
    }

    pub fn fail_job(&self, entry_id: QueueEntryId, error_message: impl Into<String>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&entry_id) {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.logs.push(LogEntry {
                timestamp: Utc::now(),
                level: LogLevel::Error,
                message: error_message.into(),
            });
        }
    }

    pub fn get_job(&self, entry_id: QueueEntryId) -> Option<Job> {
        self.jobs.read().get(&entry_id).cloned()
    }

    pub fn get_logs(&self, entry_id: QueueEntryId) -> Vec<LogEntry> {
        self.jobs
            .read()
            .get(&entry_id)
            .map(|job| job.logs.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_recorded() {
        let tracker = JobTracker::new();
        let id = QueueEntryId::new(7);

        tracker.track(id);
        assert_eq!(tracker.get_job(id).unwrap().status, JobStatus::Queued);

        tracker.start(id);
        tracker.log(id, LogLevel::Info, "Running solver");
        tracker.complete_job(id, Some(serde_json::json!({"files": 3})));

        let job = tracker.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.status.is_finished());
        assert!(job.completed_at.is_some());
        assert_eq!(job.logs.len(), 1);
        assert_eq!(job.result.unwrap()["files"], 3);
    }

    #[test]
    fn failure_appends_error_entry() {
        let tracker = JobTracker::new();
        let id = QueueEntryId::new(1);
        tracker.start(id);
        tracker.fail_job(id, "Solver timed out");

        let logs = tracker.get_logs(id);
        assert_eq!(logs.last().unwrap().level, LogLevel::Error);
        assert_eq!(tracker.get_job(id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn unknown_entries_are_ignored() {
        let tracker = JobTracker::new();
        tracker.log(QueueEntryId::new(99), LogLevel::Info, "lost");
        assert!(tracker.get_job(QueueEntryId::new(99)).is_none());
        assert!(tracker.get_logs(QueueEntryId::new(99)).is_empty());
    }

    #[test]
    fn track_keeps_existing_logs() {
        let tracker = JobTracker::new();
        let id = QueueEntryId::new(2);
        tracker.track(id);
        tracker.log(id, LogLevel::Info, "queued");
        tracker.track(id);
        assert_eq!(tracker.get_logs(id).len(), 1);
    }
}
