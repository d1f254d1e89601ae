//! Tracing wrapper for any `Repository`.
//!
//! Logs every call and counts `find_all` fetches, so callers can observe how
//! many upstream requests a resolution actually caused. The count is taken
//! when the lazy collection is first polled, which is when the inner
//! repository starts its fetch.

use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::RepositoryResult;
use crate::domain::models::{LazyCollection, Model, Record};
use crate::domain::ports::Repository;

/// Traced repository decorator.
pub struct TracedRepository<T, R> {
    inner: Arc<R>,
    /// `find_all` calls made through this wrapper.
    calls: Arc<AtomicUsize>,
    /// Lazy collections that were actually polled.
    fetches: Arc<AtomicUsize>,
    _model: PhantomData<fn() -> T>,
}

impl<T, R> TracedRepository<T, R>
where
    T: Model,
    R: Repository<T>,
{
    /// Wrap `inner`.
    pub fn new(inner: Arc<R>) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
            _model: PhantomData,
        }
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    /// Number of `find_all` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `find_all` results that were subscribed to.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T, R> Repository<T> for TracedRepository<T, R>
where
    T: Model,
    R: Repository<T> + 'static,
{
    fn find_all(&self, params: Option<Value>) -> LazyCollection<T> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(resource = T::NAME, call, params = ?params, "find_all");

        let inner = self.inner.find_all(params);
        let fetches = Arc::clone(&self.fetches);
        LazyCollection::from_future(async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            let result = inner.await;
            match &result {
                Ok(records) => debug!(resource = T::NAME, count = records.len(), "find_all resolved"),
                Err(err) => warn!(resource = T::NAME, error = %err, "find_all failed"),
            }
            result
        })
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Record<T>>> {
        debug!(resource = T::NAME, id, "find_by_id");
        self.inner.find_by_id(id).await
    }

    async fn create(&self, model: T) -> RepositoryResult<T> {
        debug!(resource = T::NAME, "create");
        self.inner.create(model).await
    }

    async fn update(&self, model: T) -> RepositoryResult<T> {
        debug!(resource = T::NAME, id = model.id(), "update");
        self.inner.update(model).await
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        debug!(resource = T::NAME, id, "delete");
        self.inner.delete(id).await
    }
}
