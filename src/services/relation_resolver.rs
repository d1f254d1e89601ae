//! Relation resolver.
//!
//! Reads a declared relation on a record. The first read of a property on a
//! record computes a lazy collection and memoizes the handle on the record;
//! later reads get the same handle back. How the handle is computed depends
//! on the relation's cache policy:
//!
//! 1. soft cache, if declared
//! 2. hard cache, if declared
//! 3. a fresh `find_all` on the resolved repository
//!
//! A `Request`-scoped policy shares handles through the request scope's
//! registry for that cache kind, keyed by repository and params. A
//! `Field`-scoped policy memoizes on the record only. `Instance` scope is
//! not implemented and fails.
//!
//! Handles that completed with an error are never served again, so the next
//! read after a failed fetch fetches anew.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::domain::errors::{RelationError, RelationResult};
use crate::domain::models::{
    CacheKind, CacheScope, LazyCollection, Model, Record, RelationDeclaration, RelationRef,
};
use crate::services::relation_catalog::RelationCatalog;
use crate::services::repository_locator::RepositoryLocator;
use crate::services::request_scope::RequestScope;

/// Resolves declared relations through the repository locator.
#[derive(Clone)]
pub struct RelationResolver {
    locator: Arc<RepositoryLocator>,
    catalog: Arc<RelationCatalog>,
}

impl RelationResolver {
    /// Create a resolver over `locator` and `catalog`.
    pub fn new(locator: Arc<RepositoryLocator>, catalog: Arc<RelationCatalog>) -> Self {
        Self { locator, catalog }
    }

    /// Repositories relations are fetched from.
    pub fn locator(&self) -> &RepositoryLocator {
        &self.locator
    }

    /// Declared relations by owner type.
    pub fn catalog(&self) -> &RelationCatalog {
        &self.catalog
    }

    /// Read relation `property_key` of `owner` as a collection of `T`.
    ///
    /// The slot check, the cache lookups and the memoization happen in one
    /// synchronous pass under the record's slot lock, so concurrent readers
    /// of the same record and property trigger at most one fetch.
    #[instrument(
        skip_all,
        fields(model = O::NAME, property = property_key, scope_id = %scope.id())
    )]
    pub fn resolve<O: Model, T: Model>(
        &self,
        owner: &Record<O>,
        property_key: &str,
        scope: &RequestScope,
    ) -> RelationResult<LazyCollection<T>> {
        let declaration = self.declaration::<O, T>(property_key)?;
        let property = declaration.property_key();

        let mut slots = owner.slots();
        if let Some(collection) = slots.get::<T>(property) {
            trace!("relation served from record");
            return Ok(collection);
        }

        let collection = match self.cached(CacheKind::Soft, owner, declaration, scope)? {
            Some(collection) => collection,
            None => match self.cached(CacheKind::Hard, owner, declaration, scope)? {
                Some(collection) => collection,
                None => self.fetch(owner, declaration)?,
            },
        };

        slots.insert(property, collection.clone());
        Ok(collection)
    }

    /// Typed accessor: read `relation` on `owner`.
    pub fn relation<O: Model, T: Model>(
        &self,
        relation: RelationRef<O, T>,
        owner: &Record<O>,
        scope: &RequestScope,
    ) -> RelationResult<LazyCollection<T>> {
        self.resolve::<O, T>(owner, relation.property_key(), scope)
    }

    /// Read `relation` on every owner, in order.
    pub fn relation_all<'a, O, T, I>(
        &self,
        relation: RelationRef<O, T>,
        owners: I,
        scope: &RequestScope,
    ) -> RelationResult<Vec<LazyCollection<T>>>
    where
        O: Model,
        T: Model,
        I: IntoIterator<Item = &'a Record<O>>,
    {
        owners
            .into_iter()
            .map(|owner| self.relation(relation, owner, scope))
            .collect()
    }

    fn declaration<O: Model, T: Model>(
        &self,
        property_key: &str,
    ) -> RelationResult<&RelationDeclaration<O>> {
        let table = self
            .catalog
            .table::<O>()
            .ok_or(RelationError::ModelNotRegistered(O::NAME))?;

        let declaration = table
            .get(property_key)
            .ok_or_else(|| RelationError::UnknownRelation {
                model: O::NAME,
                property: property_key.to_string(),
            })?;

        if !declaration.resource().is::<T>() {
            return Err(RelationError::RelationTypeMismatch {
                model: O::NAME,
                property: declaration.property_key(),
                declared: declaration.resource().name(),
                requested: T::NAME,
            });
        }

        Ok(declaration)
    }

    /// Resolve through the `kind` cache policy, or `None` if undeclared.
    fn cached<O: Model, T: Model>(
        &self,
        kind: CacheKind,
        owner: &Record<O>,
        declaration: &RelationDeclaration<O>,
        scope: &RequestScope,
    ) -> RelationResult<Option<LazyCollection<T>>> {
        let Some(cache_scope) = declaration.cache(kind) else {
            return Ok(None);
        };

        match cache_scope {
            CacheScope::Request => {
                let repository = self.locator.resolve::<T>(declaration.repository())?;
                let params = declaration.resolve_params(owner);
                scope
                    .registry(kind)
                    .find_or_add_with::<T, RelationError, _>(repository.id(), params.clone(), || {
                        debug!(kind = %kind, repository = %repository.id(), "fetching relation");
                        Ok(repository.find_all(params))
                    })
                    .map(Some)
            }
            CacheScope::Instance => Err(RelationError::NotImplemented {
                kind,
                scope: cache_scope,
            }),
            CacheScope::Field => self.fetch(owner, declaration).map(Some),
        }
    }

    /// Fresh `find_all` on the relation's repository. The handle is returned
    /// unpolled.
    fn fetch<O: Model, T: Model>(
        &self,
        owner: &Record<O>,
        declaration: &RelationDeclaration<O>,
    ) -> RelationResult<LazyCollection<T>> {
        let repository = self.locator.resolve::<T>(declaration.repository())?;
        let params = declaration.resolve_params(owner);
        debug!(repository = %repository.id(), "fetching relation");
        Ok(repository.find_all(params))
    }
}

impl fmt::Debug for RelationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationResolver")
            .field("locator", &self.locator)
            .field("catalog", &self.catalog)
            .finish()
    }
}
