//! Storage abstractions for the pipeline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Pipeline services (generation, processor, importer)    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  services.rs - multi-entity reads (draft snapshots)     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/)                         │
//! │  - TimetableRepository                                   │
//! │  - QueueRepository                                       │
//! │  - ResultRepository                                      │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!          ┌──────────▼──────────┐
//!          │  Local Repository   │
//!          │  (in-memory)        │
//!          └─────────────────────┘
//! ```

#[cfg(not(feature = "local-repo"))]
compile_error!("Enable at least one repository backend feature.");

pub mod checksum;
pub mod factory;
pub mod repositories;
pub mod repository;
pub mod services;

pub use checksum::calculate_checksum;
pub use factory::{RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
pub use repository::{
    ErrorContext, FullRepository, NewConstraint, QueueRepository, RepositoryError,
    RepositoryResult, ResultRepository, TimetableRepository,
};
pub use services::{health_check, load_calendar, load_draft_snapshot};
