//! In-memory artifact store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ArtifactKey, ArtifactKind, ArtifactStore, StorageError, StorageResult};
use crate::models::{SchoolId, TimetableId};

#[derive(Debug, Clone)]
struct StoredArtifact {
    content: Vec<u8>,
    content_type: String,
}

#[derive(Clone, Default)]
pub struct MemoryArtifactStore {
    artifacts: Arc<RwLock<BTreeMap<ArtifactKey, StoredArtifact>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type_of(&self, key: &ArtifactKey) -> Option<String> {
        self.artifacts.read().get(key).map(|a| a.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &ArtifactKey, content: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.artifacts.write().insert(
            key.clone(),
            StoredArtifact {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        self.artifacts
            .read()
            .get(key)
            .map(|a| a.content.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(
        &self,
        school_id: SchoolId,
        timetable_id: TimetableId,
        kind: ArtifactKind,
    ) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self
            .artifacts
            .read()
            .keys()
            .filter(|k| k.school_id == school_id && k.timetable_id == timetable_id && k.kind == kind)
            .map(ArtifactKey::listed_name)
            .collect();
        names.sort();
        Ok(names)
    }
}
