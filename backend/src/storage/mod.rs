//! Durable artifact storage for solver inputs and outputs.
//!
//! Artifacts are addressed as `{school}/{timetable}/{input|output}/{run}/{file}`. The
//! run segment keeps one submission's input and outputs apart from every other
//! submission of the same timetable; keys without it are still accepted.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{SchoolId, TimetableId};

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Storage I/O error on {key}: {message}")]
    Io { key: String, message: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Input,
    Output,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Input => "input",
            ArtifactKind::Output => "output",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub school_id: SchoolId,
    pub timetable_id: TimetableId,
    pub kind: ArtifactKind,
    /// Submission the artifact belongs to.
    pub run: Option<String>,
    pub file_name: String,
}

impl ArtifactKey {
    pub fn new(
        school_id: SchoolId,
        timetable_id: TimetableId,
        kind: ArtifactKind,
        file_name: impl Into<String>,
    ) -> StorageResult<Self> {
        let file_name = file_name.into();
        validate_file_name(&file_name)?;
        Ok(Self {
            school_id,
            timetable_id,
            kind,
            run: None,
            file_name,
        })
    }

    pub fn input(school_id: SchoolId, timetable_id: TimetableId, file_name: &str) -> StorageResult<Self> {
        Self::new(school_id, timetable_id, ArtifactKind::Input, file_name)
    }

    pub fn output(school_id: SchoolId, timetable_id: TimetableId, file_name: &str) -> StorageResult<Self> {
        Self::new(school_id, timetable_id, ArtifactKind::Output, file_name)
    }

    /// Place the artifact in the folder of one run.
    pub fn in_run(mut self, run: impl Into<String>) -> StorageResult<Self> {
        let run = run.into();
        validate_file_name(&run)?;
        self.run = Some(run);
        Ok(self)
    }

    /// Key for a name as returned by [`ArtifactStore::list`], `file` or `run/file`.
    pub fn from_listed(
        school_id: SchoolId,
        timetable_id: TimetableId,
        kind: ArtifactKind,
        listed: &str,
    ) -> StorageResult<Self> {
        match listed.split_once('/') {
            Some((run, file)) => Self::new(school_id, timetable_id, kind, file)?.in_run(run),
            None => Self::new(school_id, timetable_id, kind, listed),
        }
    }

    /// The `{school}/{timetable}/{kind}` directory holding this artifact.
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}", self.school_id, self.timetable_id, self.kind.as_str())
    }

    /// Path below [`prefix`](Self::prefix): `run/file`, or the bare file name.
    pub fn listed_name(&self) -> String {
        match &self.run {
            Some(run) => format!("{}/{}", run, self.file_name),
            None => self.file_name.clone(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix(), self.listed_name())
    }
}

impl FromStr for ArtifactKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidName(s.to_string());
        let mut parts = s.splitn(4, '/');
        let (Some(school), Some(timetable), Some(kind), Some(rest)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let kind = match kind {
            "input" => ArtifactKind::Input,
            "output" => ArtifactKind::Output,
            _ => return Err(invalid()),
        };
        if rest.matches('/').count() > 1 {
            return Err(invalid());
        }
        Self::from_listed(
            school.parse().map_err(|_| invalid())?,
            timetable.parse().map_err(|_| invalid())?,
            kind,
            rest,
        )
    }
}

/// Reject names that could escape the artifact directory.
pub fn validate_file_name(name: &str) -> StorageResult<()> {
    let bad = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
        || name.chars().any(char::is_control);
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Content type stored alongside an artifact, chosen by extension.
pub fn content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "xml" | "fet" => "application/xml",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &ArtifactKey, content: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn get(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>>;

    /// Artifacts under one `{school}/{timetable}/{kind}` prefix as
    /// [`ArtifactKey::listed_name`]s, sorted.
    async fn list(
        &self,
        school_id: SchoolId,
        timetable_id: TimetableId,
        kind: ArtifactKind,
    ) -> StorageResult<Vec<String>>;
}
