//! Relation declarations.
//!
//! A model declares its sub-collections once, as an immutable
//! [`RelationTable`], built from typed [`RelationRef`] handles:
//!
//! ```ignore
//! impl Purchase {
//!     pub const BOOK: RelationRef<Purchase, Book> = RelationRef::new("book$");
//!
//!     pub fn relations() -> RelationResult<RelationTable<Purchase>> {
//!         RelationTable::builder()
//!             .relation(
//!                 Self::BOOK
//!                     .declare()
//!                     .params(|purchase, _query| json!({ "id": purchase.book_id }))
//!                     .soft_cache(CacheScope::Request),
//!             )
//!             .build()
//!     }
//! }
//! ```

use serde_json::Value;
use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::cache_policy::{CacheKind, CacheScope};
use super::model::Model;
use super::record::Record;
use crate::domain::errors::{RelationError, RelationResult};

/// Maps an owner (and the query it was fetched with) to filter params.
pub type ParamsFn<O> = Arc<dyn Fn(&O, Option<&Value>) -> Value + Send + Sync>;

/// Identity of a concrete repository type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepositoryKey {
    type_id: TypeId,
    name: &'static str,
}

impl RepositoryKey {
    /// Key of repository type `R`.
    pub fn of<R: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name: short_type_name(type_name::<R>()),
        }
    }

    /// Display name, without the module path.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of one registered repository instance.
///
/// Every registration gets a fresh id, so two instances of the same
/// repository type never share request cache entries. The type key is kept
/// for overrides and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    id: u64,
    key: RepositoryKey,
}

impl RepositoryId {
    /// Allocate a new identity for a repository of type `R`.
    pub fn new<R: ?Sized + 'static>() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            key: RepositoryKey::of::<R>(),
        }
    }

    /// The concrete repository type.
    pub fn key(&self) -> RepositoryKey {
        self.key
    }

    /// Display name, without the module path.
    pub fn name(&self) -> &'static str {
        self.key.name
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key.name, self.id)
    }
}

/// Strip the module path, keeping generic arguments readable enough for logs.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// The related model type of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    type_id: TypeId,
    name: &'static str,
}

impl ResourceType {
    /// Resource type of model `T`.
    pub fn of<T: Model>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    /// The model name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this is model `T`.
    pub fn is<T: Model>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Typed name of a relation property from `O` to a collection of `T`.
pub struct RelationRef<O, T> {
    property_key: &'static str,
    _marker: PhantomData<fn(&O) -> T>,
}

impl<O, T> RelationRef<O, T> {
    /// Name the relation `property_key`.
    pub const fn new(property_key: &'static str) -> Self {
        Self {
            property_key,
            _marker: PhantomData,
        }
    }

    /// The relation property name.
    pub fn property_key(&self) -> &'static str {
        self.property_key
    }
}

impl<O: Model, T: Model> RelationRef<O, T> {
    /// Start declaring this relation.
    pub fn declare(&self) -> Relation<O> {
        Relation::new::<T>(self.property_key)
    }
}

impl<O, T> Clone for RelationRef<O, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, T> Copy for RelationRef<O, T> {}

impl<O, T> fmt::Debug for RelationRef<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelationRef").field(&self.property_key).finish()
    }
}

/// Builder for a single relation declaration.
pub struct Relation<O> {
    declaration: RelationDeclaration<O>,
}

impl<O: Model> Relation<O> {
    /// Declare `property_key` as a collection of `T`.
    pub fn new<T: Model>(property_key: &'static str) -> Self {
        Self {
            declaration: RelationDeclaration {
                property_key,
                resource: ResourceType::of::<T>(),
                params: None,
                repository: None,
                soft_cache: None,
                hard_cache: None,
            },
        }
    }

    /// Compute `find_all` params from the owner and its original query.
    pub fn params<F>(mut self, params: F) -> Self
    where
        F: Fn(&O, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.declaration.params = Some(Arc::new(params));
        self
    }

    /// Fetch through repository `R` instead of the default for the resource.
    pub fn repository<R: ?Sized + 'static>(mut self) -> Self {
        self.declaration.repository = Some(RepositoryKey::of::<R>());
        self
    }

    /// Share handles through the soft cache at `scope`.
    pub fn soft_cache(mut self, scope: CacheScope) -> Self {
        self.declaration.soft_cache = Some(scope);
        self
    }

    /// Share handles through the hard cache at `scope`.
    pub fn hard_cache(mut self, scope: CacheScope) -> Self {
        self.declaration.hard_cache = Some(scope);
        self
    }
}

/// A declared relation on owner type `O`.
pub struct RelationDeclaration<O> {
    property_key: &'static str,
    resource: ResourceType,
    params: Option<ParamsFn<O>>,
    repository: Option<RepositoryKey>,
    soft_cache: Option<CacheScope>,
    hard_cache: Option<CacheScope>,
}

impl<O: Model> RelationDeclaration<O> {
    /// The relation property name.
    pub fn property_key(&self) -> &'static str {
        self.property_key
    }

    /// The related model type.
    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    /// Repository override, if declared.
    pub fn repository(&self) -> Option<RepositoryKey> {
        self.repository
    }

    /// Whether a params function is declared.
    pub fn has_params(&self) -> bool {
        self.params.is_some()
    }

    /// The cache scope declared for `kind`, if any.
    pub fn cache(&self, kind: CacheKind) -> Option<CacheScope> {
        match kind {
            CacheKind::Soft => self.soft_cache,
            CacheKind::Hard => self.hard_cache,
        }
    }

    /// Params for fetching this relation on `owner`, or `None` when the
    /// relation declares no params function.
    pub fn resolve_params(&self, owner: &Record<O>) -> Option<Value> {
        self.params
            .as_ref()
            .map(|params| params(owner.model(), owner.original_query()))
    }
}

impl<O> fmt::Debug for RelationDeclaration<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDeclaration")
            .field("property_key", &self.property_key)
            .field("resource", &self.resource.name)
            .field("params", &self.params.is_some())
            .field("repository", &self.repository)
            .field("soft_cache", &self.soft_cache)
            .field("hard_cache", &self.hard_cache)
            .finish()
    }
}

/// Ordered, immutable set of relations declared by `O`.
pub struct RelationTable<O> {
    declarations: Vec<RelationDeclaration<O>>,
}

impl<O: Model> RelationTable<O> {
    /// Start an empty table.
    pub fn builder() -> RelationTableBuilder<O> {
        RelationTableBuilder {
            relations: Vec::new(),
        }
    }

    /// Declarations in the order they were added.
    pub fn declarations(&self) -> &[RelationDeclaration<O>] {
        &self.declarations
    }

    /// The declaration of `property_key`, if any.
    pub fn get(&self, property_key: &str) -> Option<&RelationDeclaration<O>> {
        self.declarations
            .iter()
            .find(|declaration| declaration.property_key == property_key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl<O> fmt::Debug for RelationTable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.declarations).finish()
    }
}

/// Collects relations for a [`RelationTable`].
pub struct RelationTableBuilder<O> {
    relations: Vec<Relation<O>>,
}

impl<O: Model> RelationTableBuilder<O> {
    /// Append `relation`.
    pub fn relation(mut self, relation: Relation<O>) -> Self {
        self.relations.push(relation);
        self
    }

    /// Build the table. A property key may be declared only once.
    pub fn build(self) -> RelationResult<RelationTable<O>> {
        let mut seen = HashSet::new();
        let mut declarations = Vec::with_capacity(self.relations.len());

        for relation in self.relations {
            let declaration = relation.declaration;
            if !seen.insert(declaration.property_key) {
                return Err(RelationError::DuplicateRelation {
                    model: O::NAME,
                    property: declaration.property_key,
                });
            }
            declarations.push(declaration);
        }

        Ok(RelationTable { declarations })
    }
}
