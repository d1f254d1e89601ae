//! Repository port.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::RepositoryResult;
use crate::domain::models::{LazyCollection, Model, Record};

/// Data access for one model type.
///
/// `find_all` is synchronous and lazy: it describes the fetch and returns a
/// handle, and the work happens when the handle is first awaited. Relation
/// resolution relies on this to memoize the handle before anything runs.
#[async_trait]
pub trait Repository<T: Model>: Send + Sync {
    /// All records matching `params` (`None` means unfiltered).
    fn find_all(&self, params: Option<Value>) -> LazyCollection<T>;

    /// Get a record by id.
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Record<T>>>;

    /// Persist a new model, assigning an id when it has none.
    async fn create(&self, model: T) -> RepositoryResult<T>;

    /// Replace an existing model.
    async fn update(&self, model: T) -> RepositoryResult<T>;

    /// Delete a model by id.
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
}
