//! Timetable pipeline HTTP server.
//!
//! Loads `pipeline.toml` (or built-in defaults), builds the repository, artifact store
//! and solver runner it names, starts the single queue worker and serves the REST API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin timetable-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`, `PORT`: bind address (default: 0.0.0.0:8080)
//! - `SOLVER_CONTAINER`: name of the solver container
//! - `SOLVER_TIMEOUT_SECS`: hard ceiling of one solver run
//! - `ARTIFACT_ROOT`: store artifacts on disk under this directory
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use timetable_pipeline::config::PipelineConfig;
use timetable_pipeline::db::RepositoryFactory;
use timetable_pipeline::http::{create_router, AppState};
use timetable_pipeline::services::PipelineContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting timetable pipeline server");

    let config = PipelineConfig::load()?;
    let repository = RepositoryFactory::from_settings(&config.repository)?;
    let store = config.build_store();
    let invoker = config.build_invoker();
    info!("Repository initialized, solver target: {}", invoker.target());

    let pipeline = PipelineContext::new(repository, store, invoker);
    if !pipeline.invoker.is_available().await {
        warn!("Solver environment is not reachable; submissions will be refused until it is");
    }

    let worker = pipeline.start_worker(config.poll_interval());
    let shutdown = pipeline.worker.clone();

    let app = create_router(AppState::new(pipeline));
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    shutdown.shutdown();
    worker.await?;
    Ok(())
}
