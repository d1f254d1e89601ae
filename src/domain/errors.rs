//! Domain errors for relation resolution and repository access.

use thiserror::Error;

use crate::domain::models::{CacheKind, CacheScope};

/// Synchronous failures raised while resolving a relation.
///
/// These surface directly from the resolver call; nothing is memoized when
/// one of them is returned.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("{kind} {scope} scope is not implemented yet")]
    NotImplemented { kind: CacheKind, scope: CacheScope },

    #[error("{}", repository_not_registered(.resource, *.repository))]
    RepositoryNotRegistered {
        resource: &'static str,
        repository: Option<&'static str>,
    },

    #[error("Repository {repository} does not serve resource {resource}")]
    RepositoryMismatch {
        resource: &'static str,
        repository: &'static str,
    },

    #[error("Repository {repository} is already registered for resource {resource}")]
    DuplicateRepository {
        resource: &'static str,
        repository: &'static str,
    },

    #[error("No relations registered for model {0}")]
    ModelNotRegistered(&'static str),

    #[error("Unknown relation {property} on model {model}")]
    UnknownRelation { model: &'static str, property: String },

    #[error("Relation {property} on model {model} resolves to {declared}, not {requested}")]
    RelationTypeMismatch {
        model: &'static str,
        property: &'static str,
        declared: &'static str,
        requested: &'static str,
    },

    #[error("Relation {property} declared twice on model {model}")]
    DuplicateRelation { model: &'static str, property: &'static str },

    #[error("Relations for model {0} are already registered")]
    DuplicateRelationTable(&'static str),
}

fn repository_not_registered(resource: &str, repository: Option<&str>) -> String {
    match repository {
        Some(repository) => {
            format!("Repository {repository} is not registered (requested for resource {resource})")
        }
        None => format!("No repository registered for resource {resource}"),
    }
}

/// Result of a relation resolution step.
pub type RelationResult<T> = Result<T, RelationError>;

/// Errors produced by repositories.
///
/// `Clone` because a failed fetch is replayed to every subscriber of the
/// lazy collection that carried it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Upstream fetch failed for {resource}: {message}")]
    UpstreamFetch { resource: &'static str, message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} {id} already exists")]
    Conflict { resource: &'static str, id: String },

    #[error("{resource} has no id")]
    MissingId { resource: &'static str },

    #[error("Invalid params for {resource}: {message}")]
    InvalidParams { resource: &'static str, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result of a repository operation.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
