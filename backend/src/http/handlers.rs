//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the pipeline
//! services for business logic.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

use super::dto::{
    ConstraintResponse, GenerateRequest, GenerateResponse, HealthResponse, InterchangeQuery,
    QueueEntryResponse, QueueListResponse, RegisterConstraintRequest, ResultsResponse,
    SolverStatusResponse, ToggleConstraintRequest, TriggerResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::services as db_services;
use crate::models::{ConstraintId, DraftId, QueueEntryId, TimetableId};
use crate::services::{
    ArtifactListing, DraftStatistics, GenerationRequest, ImportSummary, Preview,
};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health
// =============================================================================

/// GET /health
///
/// Service, repository and solver environment status.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository().as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };
    let solver = if state.pipeline.invoker.is_available().await {
        "running"
    } else {
        "stopped"
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
        solver: solver.to_string(),
    }))
}

/// GET /v1/solver/status
///
/// Whether the solver environment is reachable, independent of the queue.
pub async fn solver_status(State(state): State<AppState>) -> HandlerResult<SolverStatusResponse> {
    let available = state.pipeline.invoker.is_available().await;
    Ok(Json(SolverStatusResponse {
        service_status: if available { "running" } else { "stopped" }.to_string(),
        available,
        target: state.pipeline.invoker.target(),
    }))
}

// =============================================================================
// Generation and queue
// =============================================================================

/// POST /v1/timetables/{timetable_id}/generate
///
/// Queue a generation run. Returns 202 with the queue entry; the worker picks it up
/// in the background.
pub async fn generate(
    State(state): State<AppState>,
    Path(timetable_id): Path<i64>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let submission = state
        .pipeline
        .submit(GenerationRequest {
            timetable_id: TimetableId::new(timetable_id),
            file_name: request.file_name,
            document: request.document,
            submitted_by: request.submitted_by,
        })
        .await?;

    let id = submission.entry.id;
    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            entry: submission.entry,
            warnings: submission.warnings,
            message: format!("Generation queued. Track progress at /v1/queue/{}/logs", id),
        }),
    ))
}

/// GET /v1/timetables/{timetable_id}/queue
pub async fn list_queue(
    State(state): State<AppState>,
    Path(timetable_id): Path<i64>,
) -> HandlerResult<QueueListResponse> {
    let timetable_id = TimetableId::new(timetable_id);
    state.repository().get_timetable(timetable_id).await?;
    let entries = state.pipeline.queue.list(timetable_id).await?;
    let total = entries.len();
    Ok(Json(QueueListResponse { entries, total }))
}

/// GET /v1/timetables/{timetable_id}/artifacts
pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(timetable_id): Path<i64>,
) -> HandlerResult<ArtifactListing> {
    let listing = state
        .pipeline
        .generation
        .list_artifacts(TimetableId::new(timetable_id))
        .await?;
    Ok(Json(listing))
}

/// POST /v1/queue/process
///
/// Wake the queue worker. Never processes anything on the request task.
pub async fn trigger_queue(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    state.pipeline.worker.trigger();
    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            message: "Queue processing triggered".to_string(),
        }),
    )
}

/// GET /v1/queue/{entry_id}
pub async fn get_queue_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> HandlerResult<QueueEntryResponse> {
    let entry_id = QueueEntryId::new(entry_id);
    let entry = state.pipeline.queue.get(entry_id).await?;
    let job = state.pipeline.tracker().get_job(entry_id);

    Ok(Json(QueueEntryResponse {
        entry,
        logs: job.as_ref().map(|j| j.logs.clone()).unwrap_or_default(),
        result: job.and_then(|j| j.result),
    }))
}

/// GET /v1/queue/{entry_id}/logs
///
/// Stream the progress log of a queue entry via Server-Sent Events (SSE).
pub async fn stream_queue_logs(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let entry_id = QueueEntryId::new(entry_id);
    let tracker = state.pipeline.tracker().clone();
    if tracker.get_job(entry_id).is_none() {
        // Entries queued before a restart have no in-memory log.
        state.pipeline.queue.get(entry_id).await?;
        return Err(AppError::NotFound(format!(
            "No progress log for queue entry {}",
            entry_id
        )));
    }

    let stream = async_stream::stream! {
        let mut last_log_count = 0;
        loop {
            let logs = tracker.get_logs(entry_id);
            for log in logs.iter().skip(last_log_count) {
                let event_data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(event_data));
            }
            last_log_count = logs.len();

            match tracker.get_job(entry_id) {
                Some(job) if job.status.is_finished() => {
                    let final_event = serde_json::json!({
                        "status": job.status,
                        "result": job.result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
                Some(_) => {}
                None => break,
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

// =============================================================================
// Drafts
// =============================================================================

/// GET /v1/drafts/{draft_id}/interchange
///
/// Preview the solver input that would be submitted for the draft. `?raw=true`
/// returns the document itself as XML.
pub async fn preview_interchange(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
    Query(query): Query<InterchangeQuery>,
) -> Result<Response, AppError> {
    let preview: Preview = state.pipeline.generation.preview(DraftId::new(draft_id)).await?;
    if query.raw {
        return Ok(([(header::CONTENT_TYPE, "application/xml")], preview.document).into_response());
    }
    Ok(Json(preview).into_response())
}

/// GET /v1/drafts/{draft_id}/constraints
pub async fn list_constraints(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
) -> HandlerResult<Vec<ConstraintResponse>> {
    let draft_id = DraftId::new(draft_id);
    state.repository().get_draft(draft_id).await?;
    let constraints = state.pipeline.constraints.list(draft_id).await?;
    Ok(Json(constraints.into_iter().map(Into::into).collect()))
}

/// POST /v1/drafts/{draft_id}/constraints
pub async fn register_constraint(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
    Json(request): Json<RegisterConstraintRequest>,
) -> Result<(StatusCode, Json<ConstraintResponse>), AppError> {
    let stored = state
        .pipeline
        .constraints
        .register(DraftId::new(draft_id), &request.name, &request.parameters, request.active)
        .await?;
    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// PATCH /v1/drafts/{draft_id}/constraints/{constraint_id}
pub async fn toggle_constraint(
    State(state): State<AppState>,
    Path((draft_id, constraint_id)): Path<(i64, i64)>,
    Json(request): Json<ToggleConstraintRequest>,
) -> HandlerResult<ConstraintResponse> {
    let stored = state
        .pipeline
        .constraints
        .set_active(DraftId::new(draft_id), ConstraintId::new(constraint_id), request.active)
        .await?;
    Ok(Json(stored.into()))
}

/// GET /v1/drafts/{draft_id}/results
pub async fn get_results(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
) -> HandlerResult<ResultsResponse> {
    let draft_id = DraftId::new(draft_id);
    state.repository().get_draft(draft_id).await?;
    let activities = state.repository().list_solved_activities(draft_id).await?;
    let unscheduled = activities.iter().filter(|a| !a.is_scheduled()).count();
    Ok(Json(ResultsResponse {
        total: activities.len(),
        unscheduled,
        activities,
    }))
}

/// POST /v1/drafts/{draft_id}/import
///
/// Re-run the import from the outputs already stored for the draft's timetable.
pub async fn reimport(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
) -> HandlerResult<ImportSummary> {
    let summary = state.pipeline.importer.reimport(DraftId::new(draft_id)).await?;
    Ok(Json(summary))
}

/// GET /v1/drafts/{draft_id}/statistics
pub async fn get_statistics(
    State(state): State<AppState>,
    Path(draft_id): Path<i64>,
) -> HandlerResult<DraftStatistics> {
    let stats = state.pipeline.statistics.for_draft(DraftId::new(draft_id)).await?;
    Ok(Json(stats))
}

