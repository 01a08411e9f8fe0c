//! Generation submission.
//!
//! Turns a request for a timetable into a queued job: check that the solver is
//! reachable, build (or accept) the interchange document, upload it as the input
//! artifact and enqueue a reference to it.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use super::queue::JobQueueManager;
use crate::db::repository::FullRepository;
use crate::db::{calculate_checksum, load_draft_snapshot};
use crate::interchange::xml::read_document;
use crate::interchange::{build_document, serialize, BuildWarning};
use crate::models::{DraftId, NewQueueEntry, QueueEntry, TimetableId, UserId};
use crate::solver::SolverInvoker;
use crate::storage::{content_type, ArtifactKey, ArtifactKind, ArtifactStore};

/// Extension of solver input files.
pub const INPUT_EXTENSION: &str = ".fet";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub timetable_id: TimetableId,
    pub file_name: String,
    /// Pre-serialized input; rebuilt from the current draft when absent.
    #[serde(default, alias = "serializedDocument")]
    pub document: Option<String>,
    pub submitted_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub entry: QueueEntry,
    pub warnings: Vec<BuildWarning>,
}

/// A serialized input document that has not been uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub draft_id: DraftId,
    pub document: String,
    pub warnings: Vec<BuildWarning>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ArtifactListing {
    pub input: Vec<String>,
    pub output: Vec<String>,
}

#[derive(Clone)]
pub struct GenerationService {
    repository: Arc<dyn FullRepository>,
    store: Arc<dyn ArtifactStore>,
    invoker: Arc<SolverInvoker>,
    queue: JobQueueManager,
}

/// Append the input extension unless the name already carries it.
pub fn input_file_name(requested: &str) -> String {
    let name = requested.trim();
    if name.to_ascii_lowercase().ends_with(INPUT_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, INPUT_EXTENSION)
    }
}

impl GenerationService {
    pub fn new(
        repository: Arc<dyn FullRepository>,
        store: Arc<dyn ArtifactStore>,
        invoker: Arc<SolverInvoker>,
        queue: JobQueueManager,
    ) -> Self {
        Self {
            repository,
            store,
            invoker,
            queue,
        }
    }

    /// Build and serialize the input document for a draft without uploading it.
    pub async fn preview(&self, draft_id: DraftId) -> PipelineResult<Preview> {
        let snapshot = load_draft_snapshot(self.repository.as_ref(), draft_id).await?;
        let outcome = build_document(&snapshot)?;
        for warning in &outcome.warnings {
            warn!("Draft {}: {:?}", draft_id, warning);
        }
        Ok(Preview {
            draft_id,
            document: serialize(&outcome.document)?,
            warnings: outcome.warnings,
        })
    }

    /// Queue a generation run.
    ///
    /// Nothing is uploaded or queued when the solver environment is unreachable or the
    /// request is invalid.
    pub async fn submit(&self, request: GenerationRequest) -> PipelineResult<Submission> {
        if !self.invoker.is_available().await {
            return Err(PipelineError::EnvironmentUnavailable(format!(
                "{} is not running",
                self.invoker.target()
            )));
        }

        let timetable = self.repository.get_timetable(request.timetable_id).await?;
        let draft = self.repository.current_draft(timetable.id).await?;

        // Each submission gets its own run folder so a later request with the same
        // file name cannot replace an input that is still queued.
        let file_name = input_file_name(&request.file_name);
        let key = ArtifactKey::new(timetable.school_id, timetable.id, ArtifactKind::Input, &file_name)?
            .in_run(Uuid::new_v4().simple().to_string())?;

        let (document, warnings) = match request.document {
            Some(text) => {
                validate_supplied(&text)?;
                (text, Vec::new())
            }
            None => {
                let preview = self.preview(draft.id).await?;
                (preview.document, preview.warnings)
            }
        };

        let content = document.into_bytes();
        let checksum = calculate_checksum(&content);
        self.store
            .put(&key, content, content_type(&file_name))
            .await?;
        info!("Uploaded generation input {} ({})", key, checksum);

        let entry = self
            .queue
            .enqueue(NewQueueEntry {
                school_id: timetable.school_id,
                timetable_id: timetable.id,
                draft_id: draft.id,
                submitted_by: request.submitted_by,
                input_artifact: key.to_string(),
                input_checksum: checksum,
            })
            .await?;

        Ok(Submission { entry, warnings })
    }

    pub async fn list_artifacts(&self, timetable_id: TimetableId) -> PipelineResult<ArtifactListing> {
        let timetable = self.repository.get_timetable(timetable_id).await?;
        Ok(ArtifactListing {
            input: self
                .store
                .list(timetable.school_id, timetable.id, ArtifactKind::Input)
                .await?,
            output: self
                .store
                .list(timetable.school_id, timetable.id, ArtifactKind::Output)
                .await?,
        })
    }
}

fn validate_supplied(text: &str) -> PipelineResult<()> {
    if text.trim().is_empty() {
        return Err(PipelineError::Validation("Supplied document is empty".to_string()));
    }
    let root = read_document(text)
        .map_err(|e| PipelineError::Validation(format!("Supplied document is not valid: {}", e)))?;
    if root.name != "fet" {
        return Err(PipelineError::Validation(format!(
            "Supplied document has root <{}>, expected <fet>",
            root.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_names_get_the_solver_extension() {
        assert_eq!(input_file_name("term1"), "term1.fet");
        assert_eq!(input_file_name(" term1.FET "), "term1.FET");
    }

    #[test]
    fn supplied_documents_must_be_solver_input() {
        assert!(validate_supplied("<fet version=\"7.3.0\"/>").is_ok());
        assert!(matches!(validate_supplied("  "), Err(PipelineError::Validation(_))));
        assert!(matches!(validate_supplied("<html/>"), Err(PipelineError::Validation(_))));
        assert!(matches!(validate_supplied("<fet>"), Err(PipelineError::Validation(_))));
    }
}
