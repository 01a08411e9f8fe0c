//! Mapping between draft data and the solver's interchange format.
//!
//! ```text
//!  DraftSnapshot ──builder──▶ InterchangeDocument ──serialize──▶ input text
//!                                                                    │ solver
//!  SolvedActivity ◀──merge── ResultDocument ◀──parse──────────── output text
//!                                  ▲
//!                                  └── csv_export (fallback when no result document)
//! ```

pub mod builder;
pub mod csv_export;
pub mod document;
pub mod result;
pub mod xml;

pub use builder::{build_document, BuildOutcome, BuildWarning, DraftSnapshot};
pub use csv_export::parse_timetable_csv;
pub use document::{serialize, InterchangeDocument};
pub use result::{parse, serialize_result, ResultDocument};

/// Errors raised while producing or reading interchange documents.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InterchangeError {
    #[error("Malformed document: {0}")]
    Xml(String),

    #[error("Invalid solver output: missing \"{0}\"")]
    MissingSection(String),

    #[error("Invalid value {value:?} in <{element}>")]
    InvalidValue { element: String, value: String },

    #[error("Invalid timetable export: {0}")]
    Csv(String),

    #[error("Invalid draft data: {0}")]
    InvalidDraft(String),
}

pub type InterchangeResult<T> = Result<T, InterchangeError>;
