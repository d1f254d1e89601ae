//! Common test utilities for integration tests
//!
//! Shared models (purchases, books, reviews), a scripted repository that
//! records every `find_all` call, and resolver wiring helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nydus::{
    InMemoryRepository, LazyCollection, Model, Record, RelationCatalog, RelationRef,
    RelationResolver, RelationTable, Repository, RepositoryError, RepositoryLocator,
    RepositoryResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Option<String>,
    pub book_id: String,
}

impl Model for Purchase {
    const NAME: &'static str = "purchase";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<String>,
    pub title: String,
}

impl Model for Book {
    const NAME: &'static str = "book";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Option<String>,
    pub book_id: String,
    pub stars: u8,
}

impl Model for Review {
    const NAME: &'static str = "review";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

pub const BOOK: RelationRef<Purchase, Book> = RelationRef::new("book$");
pub const REVIEWS: RelationRef<Purchase, Review> = RelationRef::new("reviews$");

pub fn purchase(id: &str, book_id: &str) -> Record<Purchase> {
    Record::new(Purchase {
        id: Some(id.to_string()),
        book_id: book_id.to_string(),
    })
}

pub fn books() -> Vec<Book> {
    vec![
        Book {
            id: Some("b1".into()),
            title: "Dune".into(),
        },
        Book {
            id: Some("b2".into()),
            title: "Hyperion".into(),
        },
    ]
}

pub fn reviews() -> Vec<Review> {
    vec![
        Review {
            id: Some("r1".into()),
            book_id: "b1".into(),
            stars: 5,
        },
        Review {
            id: Some("r2".into()),
            book_id: "b2".into(),
            stars: 3,
        },
    ]
}

/// In-memory repository that records every `find_all` call and can be told
/// to fail the next fetches.
pub struct ScriptedRepository<T> {
    inner: InMemoryRepository<T>,
    calls: AtomicUsize,
    failures: AtomicUsize,
    params: Mutex<Vec<Option<Value>>>,
}

impl<T> ScriptedRepository<T>
where
    T: Model + Clone + Serialize,
{
    pub fn new(records: Vec<T>) -> Self {
        Self {
            inner: InMemoryRepository::with_records(records),
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            params: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `count` fetches fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Params of every `find_all` call, in order.
    pub fn params(&self) -> Vec<Option<Value>> {
        self.params.lock().unwrap().clone()
    }
}

#[async_trait]
impl<T> Repository<T> for ScriptedRepository<T>
where
    T: Model + Clone + Serialize,
{
    fn find_all(&self, params: Option<Value>) -> LazyCollection<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.params.lock().unwrap().push(params.clone());

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return LazyCollection::failed(RepositoryError::UpstreamFetch {
                resource: T::NAME,
                message: "connection reset".into(),
            });
        }

        self.inner.find_all(params)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Record<T>>> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, model: T) -> RepositoryResult<T> {
        self.inner.create(model).await
    }

    async fn update(&self, model: T) -> RepositoryResult<T> {
        self.inner.update(model).await
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.inner.delete(id).await
    }
}

/// Repositories and resolver for purchase relations.
pub struct Harness {
    pub books: Arc<ScriptedRepository<Book>>,
    pub reviews: Arc<ScriptedRepository<Review>>,
    pub resolver: RelationResolver,
}

/// Wire a resolver with `table` registered for purchases and scripted book
/// and review repositories bound as defaults.
pub fn harness(table: RelationTable<Purchase>) -> Harness {
    let books = Arc::new(ScriptedRepository::new(books()));
    let reviews = Arc::new(ScriptedRepository::new(reviews()));

    let mut locator = RepositoryLocator::new();
    locator
        .bind::<Book, _>(Arc::clone(&books))
        .and_then(|locator| locator.bind::<Review, _>(Arc::clone(&reviews)))
        .expect("repositories bind");

    let mut catalog = RelationCatalog::new();
    catalog.register(table).expect("table registers");

    Harness {
        books,
        reviews,
        resolver: RelationResolver::new(Arc::new(locator), Arc::new(catalog)),
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
