//! Data Transfer Objects for the HTTP API.
//!
//! Domain records that already serialize the way clients expect (queue entries,
//! solved activities, statistics) are returned as-is; the types here cover request
//! bodies and the envelopes around them.

use serde::{Deserialize, Serialize};

use crate::interchange::BuildWarning;
use crate::models::{DraftConstraint, QueueEntry, SolvedActivity, UserId};
use crate::services::LogEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub solver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverStatusResponse {
    /// `running` or `stopped`.
    pub service_status: String,
    pub available: bool,
    pub target: String,
}

/// Body of `POST /v1/timetables/{id}/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub file_name: String,
    /// Serialized solver input; built from the current draft when omitted.
    #[serde(default, alias = "serializedDocument")]
    pub document: Option<String>,
    #[serde(default = "default_submitter")]
    pub submitted_by: UserId,
}

fn default_submitter() -> UserId {
    UserId::new("system")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub entry: QueueEntry,
    pub warnings: Vec<BuildWarning>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListResponse {
    pub entries: Vec<QueueEntry>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryResponse {
    pub entry: QueueEntry,
    pub logs: Vec<LogEntry>,
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConstraintRequest {
    pub name: String,
    pub parameters: serde_json::Value,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleConstraintRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintResponse {
    #[serde(flatten)]
    pub constraint: DraftConstraint,
    /// The stored payload decoded, for display.
    pub payload: serde_json::Value,
}

impl From<DraftConstraint> for ConstraintResponse {
    fn from(constraint: DraftConstraint) -> Self {
        let payload = serde_json::from_str(&constraint.parameters).unwrap_or(serde_json::Value::Null);
        Self { constraint, payload }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub activities: Vec<SolvedActivity>,
    pub total: usize,
    pub unscheduled: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InterchangeQuery {
    /// Return only the document text instead of the JSON envelope.
    #[serde(default)]
    pub raw: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_accepts_serialized_document_field() {
        let request: GenerateRequest = serde_json::from_value(serde_json::json!({
            "fileName": "term",
            "serializedDocument": "<fet version=\"7.3.0\"/>"
        }))
        .unwrap();
        assert_eq!(request.document.as_deref(), Some("<fet version=\"7.3.0\"/>"));
        assert_eq!(request.submitted_by, UserId::new("system"));

        let request: GenerateRequest =
            serde_json::from_value(serde_json::json!({"fileName": "term", "document": "<fet/>"})).unwrap();
        assert_eq!(request.document.as_deref(), Some("<fet/>"));
    }
}
