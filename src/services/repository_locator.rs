//! Repository locator.
//!
//! Maps model types to the repository instances that serve them. A
//! repository type is registered at most once per model type; each model
//! type has a default repository and may be served by others through an
//! explicit override on the relation declaration. Every registration gets
//! its own [`RepositoryId`], which is what request caches key on.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{RelationError, RelationResult};
use crate::domain::models::{Model, RepositoryId, RepositoryKey};
use crate::domain::ports::Repository;

/// A repository resolved for model `T`, with its identity.
pub struct ResolvedRepository<T: Model> {
    id: RepositoryId,
    repository: Arc<dyn Repository<T>>,
}

impl<T: Model> ResolvedRepository<T> {
    /// Identity of the registered instance; cache registries key on it.
    pub fn id(&self) -> RepositoryId {
        self.id
    }

    /// The concrete repository type.
    pub fn key(&self) -> RepositoryKey {
        self.id.key()
    }

    /// The repository itself.
    pub fn repository(&self) -> &Arc<dyn Repository<T>> {
        &self.repository
    }
}

impl<T: Model> Clone for ResolvedRepository<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<T: Model> Deref for ResolvedRepository<T> {
    type Target = dyn Repository<T>;

    fn deref(&self) -> &Self::Target {
        self.repository.as_ref()
    }
}

impl<T: Model> fmt::Debug for ResolvedRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRepository")
            .field("resource", &T::NAME)
            .field("repository", &self.id)
            .finish()
    }
}

struct Registration {
    id: RepositoryId,
    /// `Arc<dyn Repository<T>>` boxed as `Any`.
    repository: Box<dyn Any + Send + Sync>,
}

/// Registry of repository instances.
#[derive(Default)]
pub struct RepositoryLocator {
    /// (model type, repository type) -> registered instance.
    repositories: HashMap<(TypeId, RepositoryKey), Registration>,
    /// Model type -> default repository.
    defaults: HashMap<TypeId, RepositoryKey>,
}

impl RepositoryLocator {
    /// Create an empty locator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `repository` and make it the default for model `T`.
    ///
    /// Fails if a repository of type `R` is already registered for `T`.
    pub fn bind<T, R>(&mut self, repository: Arc<R>) -> RelationResult<&mut Self>
    where
        T: Model,
        R: Repository<T> + 'static,
    {
        let id = self.insert::<T, R>(repository)?;
        self.defaults.insert(TypeId::of::<T>(), id.key());
        debug!(resource = T::NAME, repository = %id, "bound default repository");
        Ok(self)
    }

    /// Register `repository` without changing the default for `T`.
    ///
    /// It is reachable only through an explicit repository override.
    pub fn provide<T, R>(&mut self, repository: Arc<R>) -> RelationResult<&mut Self>
    where
        T: Model,
        R: Repository<T> + 'static,
    {
        let id = self.insert::<T, R>(repository)?;
        debug!(resource = T::NAME, repository = %id, "registered repository");
        Ok(self)
    }

    fn insert<T, R>(&mut self, repository: Arc<R>) -> RelationResult<RepositoryId>
    where
        T: Model,
        R: Repository<T> + 'static,
    {
        let slot = (TypeId::of::<T>(), RepositoryKey::of::<R>());
        if self.repositories.contains_key(&slot) {
            return Err(RelationError::DuplicateRepository {
                resource: T::NAME,
                repository: slot.1.name(),
            });
        }

        let id = RepositoryId::new::<R>();
        let repository: Arc<dyn Repository<T>> = repository;
        self.repositories.insert(
            slot,
            Registration {
                id,
                repository: Box::new(repository),
            },
        );
        Ok(id)
    }

    /// Resolve the repository for `T`, or the explicit `repository` override.
    pub fn resolve<T: Model>(
        &self,
        repository: Option<RepositoryKey>,
    ) -> RelationResult<ResolvedRepository<T>> {
        let model = TypeId::of::<T>();
        let key = match repository {
            Some(key) => key,
            None => *self.defaults.get(&model).ok_or(
                RelationError::RepositoryNotRegistered {
                    resource: T::NAME,
                    repository: None,
                },
            )?,
        };

        let Some(registration) = self.repositories.get(&(model, key)) else {
            // registered, but only for other models
            if self.repositories.keys().any(|(_, registered)| *registered == key) {
                return Err(RelationError::RepositoryMismatch {
                    resource: T::NAME,
                    repository: key.name(),
                });
            }
            return Err(RelationError::RepositoryNotRegistered {
                resource: T::NAME,
                repository: Some(key.name()),
            });
        };

        let repository = registration
            .repository
            .downcast_ref::<Arc<dyn Repository<T>>>()
            .ok_or(RelationError::RepositoryMismatch {
                resource: T::NAME,
                repository: key.name(),
            })?;

        Ok(ResolvedRepository {
            id: registration.id,
            repository: Arc::clone(repository),
        })
    }

    /// Whether a default repository is bound for `T`.
    pub fn has_default<T: Model>(&self) -> bool {
        self.defaults.contains_key(&TypeId::of::<T>())
    }

    /// Number of registrations across all model types.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl fmt::Debug for RepositoryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self
            .repositories
            .values()
            .map(|registration| registration.id.to_string())
            .collect();
        ids.sort_unstable();
        f.debug_struct("RepositoryLocator")
            .field("repositories", &ids)
            .finish()
    }
}
