//! Repository decorator that logs and counts fetches.

mod traced_repository;

pub use traced_repository::TracedRepository;
