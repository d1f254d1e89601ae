//! Lazy, shareable handle for an eventual collection of records.
//!
//! Repositories return a [`LazyCollection`] from `find_all` without doing any
//! work: the underlying future starts on first poll. Every clone observes the
//! same result, including clones awaited after the result is available.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::model::Model;
use super::record::Record;
use crate::domain::errors::RepositoryError;

/// The resolved value of a lazy collection.
pub type Collection<T> = Arc<[Arc<Record<T>>]>;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Collection<T>, RepositoryError>>>;

/// Cloneable handle to a pending or completed fetch.
pub struct LazyCollection<T> {
    inner: SharedFetch<T>,
}

impl<T: Model> LazyCollection<T> {
    /// Wrap a fetch future. Nothing runs until the handle is awaited.
    pub fn new<F>(fetch: F) -> Self
    where
        F: Future<Output = Result<Vec<Record<T>>, RepositoryError>> + Send + 'static,
    {
        Self::from_future(async move {
            let records = fetch.await?;
            Ok(records.into_iter().map(Arc::new).collect::<Collection<T>>())
        })
    }

    /// Wrap a future that already yields a shared collection, e.g. another
    /// handle with extra work around it.
    pub fn from_future<F>(fetch: F) -> Self
    where
        F: Future<Output = Result<Collection<T>, RepositoryError>> + Send + 'static,
    {
        Self {
            inner: fetch.boxed().shared(),
        }
    }

    /// A handle that yields `records` when awaited.
    pub fn ready(records: Vec<Record<T>>) -> Self {
        Self::new(async move { Ok(records) })
    }

    /// A handle that yields `error` when awaited.
    pub fn failed(error: RepositoryError) -> Self {
        Self::new(async move { Err(error) })
    }

    /// Whether both handles refer to the same underlying fetch.
    pub fn same_handle(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// The result, if the fetch already completed.
    pub fn peek(&self) -> Option<&Result<Collection<T>, RepositoryError>> {
        self.inner.peek()
    }

    /// Whether the fetch has completed, successfully or not.
    pub fn is_resolved(&self) -> bool {
        self.peek().is_some()
    }

    /// True once the fetch completed with an error.
    pub fn is_failed(&self) -> bool {
        matches!(self.peek(), Some(Err(_)))
    }
}

impl<T> Clone for LazyCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Model> Future for LazyCollection<T> {
    type Output = Result<Collection<T>, RepositoryError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl<T: Model> fmt::Debug for LazyCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("LazyCollection")
            .field("resource", &T::NAME)
            .field("state", &state)
            .finish()
    }
}
