//! Model instances as handed out by repositories.
//!
//! A [`Record`] wraps a model with the per-instance state that relation
//! resolution needs: the query the record was fetched with, and the memo
//! slots holding one resolved relation handle per property.

use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::lazy_collection::LazyCollection;
use super::model::Model;

/// A model instance plus its relation memo slots.
pub struct Record<M> {
    model: M,
    original_query: Option<Value>,
    slots: Mutex<RelationSlots>,
}

impl<M: Model> Record<M> {
    /// Wrap a freshly constructed model (no original query).
    pub fn new(model: M) -> Self {
        Self {
            model,
            original_query: None,
            slots: Mutex::new(RelationSlots::default()),
        }
    }

    /// Wrap a model fetched as part of a query.
    pub fn with_query(model: M, query: Option<Value>) -> Self {
        Self {
            model,
            original_query: query,
            slots: Mutex::new(RelationSlots::default()),
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The query this record was fetched with, if any.
    pub fn original_query(&self) -> Option<&Value> {
        self.original_query.as_ref()
    }

    /// Unwrap the model, dropping every memoized relation.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Number of relation properties currently memoized on this record.
    pub fn memoized_relations(&self) -> usize {
        self.slots().len()
    }

    pub(crate) fn slots(&self) -> MutexGuard<'_, RelationSlots> {
        // A panic inside a params callback must not disable the record.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> Deref for Record<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M: fmt::Debug> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model)
            .field("original_query", &self.original_query)
            .finish_non_exhaustive()
    }
}

/// Memoized relation handles keyed by property.
#[derive(Default)]
pub(crate) struct RelationSlots {
    slots: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl RelationSlots {
    /// The memoized handle for `property`, unless it has failed.
    ///
    /// A failed handle is dropped so the next resolution fetches again.
    pub(crate) fn get<T: Model>(&mut self, property: &'static str) -> Option<LazyCollection<T>> {
        let collection = self
            .slots
            .get(property)
            .and_then(|slot| slot.downcast_ref::<LazyCollection<T>>())
            .cloned()?;

        if collection.is_failed() {
            self.slots.remove(property);
            return None;
        }

        Some(collection)
    }

    pub(crate) fn insert<T: Model>(&mut self, property: &'static str, collection: LazyCollection<T>) {
        self.slots.insert(property, Box::new(collection));
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
