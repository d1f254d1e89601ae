//! nydus - relation resolution and request-scoped caching for repositories
//!
//! Models declare sub-collection relations to other models. Reading a
//! relation on a record turns into a `find_all(params)` call on the related
//! model's repository; the lazy result is memoized on the record and,
//! depending on the declared cache policy, shared across a request scope.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, relation declarations, the
//!   repository port and errors
//! - **Service Layer** (`services`): relation catalog, repository locator,
//!   request scope and the relation resolver
//! - **Adapters** (`adapters`): in-memory and traced repositories
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use nydus::{RelationCatalog, RelationResolver, RepositoryLocator, RequestScope};
//!
//! let mut locator = RepositoryLocator::new();
//! locator.bind::<Book, _>(Arc::new(InMemoryRepository::with_records(books)))?;
//!
//! let mut catalog = RelationCatalog::new();
//! catalog.register(
//!     RelationTable::builder()
//!         .relation(Purchase::BOOK.declare().soft_cache(CacheScope::Request))
//!         .build()?,
//! )?;
//!
//! let resolver = RelationResolver::new(Arc::new(locator), Arc::new(catalog));
//! let scope = RequestScope::new();
//! let books = resolver.relation(Purchase::BOOK, &purchase, &scope)?.await?;
//! scope.dispose();
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use adapters::memory::InMemoryRepository;
pub use adapters::traced::TracedRepository;
pub use domain::errors::{RelationError, RelationResult, RepositoryError, RepositoryResult};
pub use domain::models::{
    CacheKind, CacheScope, Collection, Config, LazyCollection, Model, Record, Relation,
    RelationDeclaration, RelationRef, RelationTable, RepositoryId, RepositoryKey,
};
pub use domain::ports::Repository;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CacheRegistry, CacheStats, RelationCatalog, RelationResolver, RepositoryLocator,
    RequestScope, ResolvedRepository, ScopeReport,
};
