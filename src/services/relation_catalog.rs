//! Relation tables for every registered model type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::domain::errors::{RelationError, RelationResult};
use crate::domain::models::{Model, RelationDeclaration, RelationTable};

/// Immutable relation tables keyed by owner type, built once at startup.
#[derive(Default)]
pub struct RelationCatalog {
    tables: HashMap<TypeId, (&'static str, Box<dyn Any + Send + Sync>)>,
}

impl RelationCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the relation table of `O`. Each model registers once.
    pub fn register<O: Model>(&mut self, table: RelationTable<O>) -> RelationResult<&mut Self> {
        let type_id = TypeId::of::<O>();
        if self.tables.contains_key(&type_id) {
            return Err(RelationError::DuplicateRelationTable(O::NAME));
        }

        debug!(model = O::NAME, relations = table.len(), "registered relation table");
        self.tables.insert(type_id, (O::NAME, Box::new(table)));
        Ok(self)
    }

    /// The relation table of `O`, if registered.
    pub fn table<O: Model>(&self) -> Option<&RelationTable<O>> {
        self.tables
            .get(&TypeId::of::<O>())
            .and_then(|(_, table)| table.downcast_ref::<RelationTable<O>>())
    }

    /// Declarations of `O` in declaration order; empty if unregistered.
    pub fn declarations<O: Model>(&self) -> &[RelationDeclaration<O>] {
        self.table::<O>()
            .map(RelationTable::declarations)
            .unwrap_or_default()
    }

    /// Whether relations are registered for `O`.
    pub fn contains<O: Model>(&self) -> bool {
        self.tables.contains_key(&TypeId::of::<O>())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl fmt::Debug for RelationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<_> = self.tables.values().map(|(name, _)| *name).collect();
        models.sort_unstable();
        f.debug_struct("RelationCatalog").field("models", &models).finish()
    }
}
