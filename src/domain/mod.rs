//! Domain layer for nydus.
//!
//! Models, relation declarations and the repository port. Nothing in here
//! depends on adapters or services.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{RelationError, RelationResult, RepositoryError, RepositoryResult};
