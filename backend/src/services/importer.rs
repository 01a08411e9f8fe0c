//! Result Importer.
//!
//! Reads the solver's output files for a draft and replaces that draft's solved
//! activities in one atomic write. The structured result document is preferred; the
//! flat CSV export is used when no result document was produced.

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::error::{PipelineError, PipelineResult};
use crate::db::repository::FullRepository;
use crate::interchange::{parse, parse_timetable_csv};
use crate::models::{DraftId, QueueStatus, SolvedActivity};
use crate::solver::invoker::{primary_result, OutputFile, TIMETABLE_CSV_SUFFIX};
use crate::storage::{content_type, ArtifactKey, ArtifactKind, ArtifactStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub draft_id: DraftId,
    /// Output file the results were read from.
    pub source: String,
    pub imported: usize,
    pub unscheduled: usize,
    /// Other drafts of the timetable marked superseded by this import.
    pub superseded: usize,
}

#[derive(Clone)]
pub struct ResultImporter {
    repository: Arc<dyn FullRepository>,
    store: Arc<dyn ArtifactStore>,
}

/// Extract solved activities from a set of output files.
pub fn read_results(files: &[OutputFile]) -> PipelineResult<(String, Vec<SolvedActivity>)> {
    if let Some(file) = primary_result(files) {
        let text = String::from_utf8_lossy(&file.content);
        let document = parse(&text).map_err(|e| PipelineError::Parse(format!("{}: {}", file.name, e)))?;
        return Ok((file.name.clone(), document.solved_activities()));
    }

    if let Some(file) = files.iter().find(|f| f.name.ends_with(TIMETABLE_CSV_SUFFIX)) {
        warn!("No result document among outputs, falling back to {}", file.name);
        let text = String::from_utf8_lossy(&file.content);
        let activities =
            parse_timetable_csv(&text).map_err(|e| PipelineError::Parse(format!("{}: {}", file.name, e)))?;
        return Ok((file.name.clone(), activities));
    }

    Err(PipelineError::Parse(format!(
        "No result document or timetable export among {} output files",
        files.len()
    )))
}

impl ResultImporter {
    pub fn new(repository: Arc<dyn FullRepository>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { repository, store }
    }

    /// Import results from output files of a run for `draft_id`.
    ///
    /// On success the draft's recorded error is cleared and every other draft of the
    /// same timetable is superseded.
    pub async fn import_files(&self, draft_id: DraftId, files: &[OutputFile]) -> PipelineResult<ImportSummary> {
        let draft = self.repository.get_draft(draft_id).await?;
        let (source, activities) = read_results(files)?;
        let unscheduled = activities.iter().filter(|a| !a.is_scheduled()).count();

        let imported = self
            .repository
            .replace_solved_activities(draft_id, activities)
            .await
            .map_err(|e| PipelineError::Import(e.to_string()))?;

        let superseded = self
            .repository
            .supersede_other_drafts(draft.timetable_id, draft_id)
            .await?;
        self.repository.record_draft_error(draft_id, None, None).await?;

        info!(
            "Imported {} activities ({} unscheduled) into draft {} from {}",
            imported, unscheduled, draft_id, source
        );
        Ok(ImportSummary {
            draft_id,
            source,
            imported,
            unscheduled,
            superseded,
        })
    }

    /// Re-run the import from the stored outputs of the draft's latest completed
    /// generation. Outputs of other runs of the same timetable are never read.
    pub async fn reimport(&self, draft_id: DraftId) -> PipelineResult<ImportSummary> {
        let draft = self.repository.get_draft(draft_id).await?;
        let timetable = self.repository.get_timetable(draft.timetable_id).await?;

        let entry = self
            .repository
            .list_queue_entries(timetable.id)
            .await?
            .into_iter()
            .filter(|e| e.draft_id == draft_id && e.status == QueueStatus::Completed)
            .max_by_key(|e| (e.completed_at, e.id))
            .ok_or_else(|| {
                PipelineError::NotFound(format!("No completed generation for draft {}", draft_id))
            })?;

        let names = self
            .store
            .list(timetable.school_id, timetable.id, ArtifactKind::Output)
            .await?;
        let folder = entry.run().map(|run| format!("{}/", run));
        let names: Vec<String> = names
            .into_iter()
            .filter(|name| match &folder {
                Some(folder) => name.starts_with(folder.as_str()),
                None => !name.contains('/'),
            })
            .collect();
        if names.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "No solver outputs stored for generation {}",
                entry.id
            )));
        }

        let mut files = Vec::with_capacity(names.len());
        for name in names {
            let key = ArtifactKey::from_listed(timetable.school_id, timetable.id, ArtifactKind::Output, &name)?;
            let content = self.store.get(&key).await?;
            files.push(OutputFile {
                content_type: content_type(&key.file_name),
                name: key.file_name,
                content,
            });
        }

        info!("Re-importing draft {} from generation {}", draft_id, entry.id);
        self.import_files(draft_id, &files).await
    }
}
