//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        .route("/solver/status", get(handlers::solver_status))
        // Generation and queue
        .route("/timetables/{timetable_id}/generate", post(handlers::generate))
        .route("/timetables/{timetable_id}/queue", get(handlers::list_queue))
        .route("/timetables/{timetable_id}/artifacts", get(handlers::list_artifacts))
        .route("/queue/process", post(handlers::trigger_queue))
        .route("/queue/{entry_id}", get(handlers::get_queue_entry))
        .route("/queue/{entry_id}/logs", get(handlers::stream_queue_logs))
        // Drafts
        .route("/drafts/{draft_id}/interchange", get(handlers::preview_interchange))
        .route(
            "/drafts/{draft_id}/constraints",
            get(handlers::list_constraints).post(handlers::register_constraint),
        )
        .route(
            "/drafts/{draft_id}/constraints/{constraint_id}",
            patch(handlers::toggle_constraint),
        )
        .route("/drafts/{draft_id}/results", get(handlers::get_results))
        .route("/drafts/{draft_id}/import", post(handlers::reimport))
        .route("/drafts/{draft_id}/statistics", get(handlers::get_statistics));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        // Pre-serialized solver documents can be large.
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
