//! Generation queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{DraftId, QueueEntryId, SchoolId, TimetableId, UserId};

/// Lifecycle of a queue entry: `queued -> inProgress -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (QueueStatus::Queued, QueueStatus::InProgress)
                | (QueueStatus::InProgress, QueueStatus::Completed)
                | (QueueStatus::InProgress, QueueStatus::Failed)
        )
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueStatus::Queued => "queued",
            QueueStatus::InProgress => "inProgress",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Data supplied when a generation request is enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueueEntry {
    pub school_id: SchoolId,
    pub timetable_id: TimetableId,
    pub draft_id: DraftId,
    pub submitted_by: UserId,
    /// Storage key of the uploaded solver input.
    pub input_artifact: String,
    pub input_checksum: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub school_id: SchoolId,
    pub timetable_id: TimetableId,
    pub draft_id: DraftId,
    pub submitted_by: UserId,
    pub input_artifact: String,
    pub input_checksum: String,
    pub status: QueueStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Captured solver diagnostics for failed runs.
    pub diagnostics: Option<String>,
}

impl QueueEntry {
    pub fn from_new(id: QueueEntryId, new: NewQueueEntry, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            school_id: new.school_id,
            timetable_id: new.timetable_id,
            draft_id: new.draft_id,
            submitted_by: new.submitted_by,
            input_artifact: new.input_artifact,
            input_checksum: new.input_checksum,
            status: QueueStatus::Queued,
            submitted_at,
            started_at: None,
            completed_at: None,
            diagnostics: None,
        }
    }

    /// File name of the input artifact (last path segment of its key).
    pub fn input_file_name(&self) -> &str {
        self.input_artifact
            .rsplit('/')
            .next()
            .unwrap_or(self.input_artifact.as_str())
    }

    /// Run folder shared by this entry's input and outputs, when its input key has one.
    pub fn run(&self) -> Option<&str> {
        let parts: Vec<&str> = self.input_artifact.split('/').collect();
        match parts.as_slice() {
            [_, _, _, run, _] => Some(run),
            _ => None,
        }
    }
}

/// Result of asking the queue for the next job.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The oldest queued entry, now `inProgress`.
    Claimed(QueueEntry),
    /// Another entry is already running.
    Busy(QueueEntryId),
    /// Nothing is waiting.
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_are_legal() {
        use QueueStatus::*;
        assert!(Queued.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(Queued));
        assert!(!Failed.can_transition_to(InProgress));
    }

    #[test]
    fn status_serializes_camel_case() {
        let json = serde_json::to_string(&QueueStatus::InProgress).unwrap();
        assert_eq!(json, "\"inProgress\"");
        assert_eq!(QueueStatus::InProgress.to_string(), "inProgress");
    }

    #[test]
    fn input_file_name_is_last_segment() {
        let entry = QueueEntry::from_new(
            QueueEntryId::new(1),
            NewQueueEntry {
                school_id: SchoolId::new(4),
                timetable_id: TimetableId::new(9),
                draft_id: DraftId::new(2),
                submitted_by: UserId::new("admin"),
                input_artifact: "4/9/input/term1.fet".to_string(),
                input_checksum: "abc".to_string(),
            },
            Utc::now(),
        );
        assert_eq!(entry.input_file_name(), "term1.fet");
        assert_eq!(entry.status, QueueStatus::Queued);
        assert_eq!(entry.run(), None);

        let mut entry = entry;
        entry.input_artifact = "4/9/input/5f0c/term1.fet".to_string();
        assert_eq!(entry.input_file_name(), "term1.fet");
        assert_eq!(entry.run(), Some("5f0c"));
    }
}
