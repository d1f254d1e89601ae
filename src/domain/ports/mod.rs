//! Port traits (Hexagonal Architecture).
//!
//! Adapters implement these; the relation resolver depends only on them.

pub mod repository;

pub use repository::Repository;
