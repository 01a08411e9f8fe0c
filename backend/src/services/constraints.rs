//! Draft constraint registration.
//!
//! Payloads are checked against the constraint registry before anything is written,
//! so only well-formed constraints ever reach the builder.

use log::info;
use std::sync::Arc;

use super::error::PipelineResult;
use crate::db::repository::{FullRepository, NewConstraint};
use crate::models::{ConstraintId, ConstraintKind, DraftConstraint, DraftId};

#[derive(Clone)]
pub struct ConstraintService {
    repository: Arc<dyn FullRepository>,
}

impl ConstraintService {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }

    /// Validate and attach a constraint to a draft.
    ///
    /// The payload is stored in its normalized form.
    pub async fn register(
        &self,
        draft_id: DraftId,
        name: &str,
        parameters: &serde_json::Value,
        active: bool,
    ) -> PipelineResult<DraftConstraint> {
        let constraint = ConstraintKind::parse(name.trim(), parameters)?;
        self.repository.get_draft(draft_id).await?;

        let stored = self
            .repository
            .add_constraint(NewConstraint {
                draft_id,
                canonical_name: constraint.canonical_name().to_string(),
                scope: constraint.scope(),
                active,
                parameters: constraint.parameters().to_string(),
            })
            .await?;
        info!(
            "Registered {} constraint {} ({}) on draft {}",
            stored.scope, stored.id, stored.canonical_name, draft_id
        );
        Ok(stored)
    }

    pub async fn set_active(
        &self,
        draft_id: DraftId,
        constraint_id: ConstraintId,
        active: bool,
    ) -> PipelineResult<DraftConstraint> {
        let stored = self
            .repository
            .set_constraint_active(draft_id, constraint_id, active)
            .await?;
        info!(
            "Constraint {} on draft {} is now {}",
            constraint_id,
            draft_id,
            if active { "active" } else { "inactive" }
        );
        Ok(stored)
    }

    pub async fn list(&self, draft_id: DraftId) -> PipelineResult<Vec<DraftConstraint>> {
        Ok(self.repository.list_constraints(draft_id).await?)
    }
}
