//! Repository implementations.
//!
//! - `local`: in-memory implementation used by the server's default backend and by tests
pub mod local;

pub use local::LocalRepository;
