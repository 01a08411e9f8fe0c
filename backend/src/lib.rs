//! # Timetable Pipeline
//!
//! Generation pipeline for school timetables backed by an external solver.
//!
//! A draft's days, periods, activities, rooms and constraints are turned into the
//! solver's interchange document, uploaded as an input artifact and queued. A single
//! background worker runs the solver in its isolated environment, stores every output
//! file and imports the placements back as solved activities, from which per-person
//! load statistics are derived on demand.
//!
//! ## Architecture
//!
//! - [`models`]: ids, draft entities, the typed constraint registry, queue entries
//! - [`interchange`]: document builder, serializer and result parser
//! - [`db`]: repository traits and the in-memory implementation
//! - [`storage`]: artifact storage for solver inputs and outputs
//! - [`solver`]: process runners and the solver invoker
//! - [`services`]: queue, submission, worker, import, statistics
//! - [`config`]: TOML configuration
//! - [`http`]: Axum REST API (`http-server` feature)

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod interchange;
pub mod models;
pub mod services;
pub mod solver;
pub mod storage;

#[cfg(feature = "http-server")]
pub mod http;
