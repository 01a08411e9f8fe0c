//! Filesystem artifact store rooted at a configured directory.

use async_trait::async_trait;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ArtifactKey, ArtifactKind, ArtifactStore, StorageError, StorageResult};
use crate::models::{SchoolId, TimetableId};

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, school_id: SchoolId, timetable_id: TimetableId, kind: ArtifactKind) -> PathBuf {
        self.root
            .join(school_id.to_string())
            .join(timetable_id.to_string())
            .join(kind.as_str())
    }

    fn path(&self, key: &ArtifactKey) -> PathBuf {
        let mut path = self.dir(key.school_id, key.timetable_id, key.kind);
        if let Some(run) = &key.run {
            path.push(run);
        }
        path.join(&key.file_name)
    }
}

/// Regular files and subdirectories directly inside `dir`, as names.
async fn read_entries(dir: &Path) -> StorageResult<(Vec<String>, Vec<String>)> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
        Err(e) => return Err(io_err(dir.display(), e)),
    };

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_err(dir.display(), e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry.file_type().await {
            Ok(t) if t.is_file() => files.push(name),
            Ok(t) if t.is_dir() => dirs.push(name),
            _ => {}
        }
    }
    Ok((files, dirs))
}

fn io_err(key: impl ToString, e: std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &ArtifactKey, content: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(key, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_err(key, e))?;
        debug!("Stored artifact {} ({}) at {}", key, content_type, path.display());
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(io_err(key, e)),
        }
    }

    async fn list(
        &self,
        school_id: SchoolId,
        timetable_id: TimetableId,
        kind: ArtifactKind,
    ) -> StorageResult<Vec<String>> {
        let dir = self.dir(school_id, timetable_id, kind);
        let (mut names, runs) = read_entries(&dir).await?;
        for run in runs {
            let (files, _) = read_entries(&dir.join(&run)).await?;
            names.extend(files.into_iter().map(|file| format!("{}/{}", run, file)));
        }
        names.sort();
        Ok(names)
    }
}
