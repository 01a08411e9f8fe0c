//! Repository trait definitions.
//!
//! The pipeline's storage needs are split into three focused traits:
//!
//! - [`TimetableRepository`]: read access to draft inputs, plus the few writes the
//!   pipeline makes to drafts (constraints, error recording, supersession)
//! - [`QueueRepository`]: the generation queue and its single-flight claim
//! - [`ResultRepository`]: solved activities per draft revision
//!
//! Services that need everything take the [`FullRepository`] bound:
//!
//! ```ignore
//! async fn drain_once<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<()> {
//!     if let ClaimOutcome::Claimed(entry) = repo.claim_next().await? {
//!         let draft = repo.get_draft(entry.draft_id).await?;
//!         // ...
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod queue;
pub mod results;
pub mod timetable;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use queue::QueueRepository;
pub use results::ResultRepository;
pub use timetable::{NewConstraint, TimetableRepository};

/// Composite bound for a complete repository implementation.
///
/// Implemented automatically for any type that implements all three traits.
pub trait FullRepository: TimetableRepository + QueueRepository + ResultRepository {}

impl<T> FullRepository for T where T: TimetableRepository + QueueRepository + ResultRepository {}
