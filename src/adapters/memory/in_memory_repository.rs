//! In-memory repository.
//!
//! Keeps models in a map keyed by id. `find_all` filters by params: a JSON
//! object matches a model when every key equals the same field of the
//! model's serialized form. Records returned by `find_all` carry the params
//! they were fetched with as their original query.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::models::{LazyCollection, Model, Record};
use crate::domain::ports::Repository;

/// Repository backed by a `BTreeMap` behind a tokio `RwLock`.
pub struct InMemoryRepository<T> {
    records: Arc<RwLock<BTreeMap<String, T>>>,
}

impl<T> InMemoryRepository<T>
where
    T: Model + Clone + Serialize,
{
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Seed the repository. Models without an id get a generated one.
    pub fn with_records(models: impl IntoIterator<Item = T>) -> Self {
        let records = models
            .into_iter()
            .map(|mut model| {
                let id = match model.id() {
                    Some(id) => id.to_string(),
                    None => {
                        let id = Uuid::new_v4().to_string();
                        model.set_id(id.clone());
                        id
                    }
                };
                (id, model)
            })
            .collect();

        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<T> Default for InMemoryRepository<T>
where
    T: Model + Clone + Serialize,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `model` satisfies the `find_all` filter.
fn matches_filter<T: Serialize>(model: &T, filter: &serde_json::Map<String, Value>) -> RepositoryResult<bool> {
    let value = serde_json::to_value(model)?;
    Ok(filter
        .iter()
        .all(|(field, expected)| value.get(field) == Some(expected)))
}

#[async_trait]
impl<T> Repository<T> for InMemoryRepository<T>
where
    T: Model + Clone + Serialize,
{
    fn find_all(&self, params: Option<Value>) -> LazyCollection<T> {
        let records = Arc::clone(&self.records);

        LazyCollection::new(async move {
            let filter = match &params {
                None | Some(Value::Null) => None,
                Some(Value::Object(filter)) => Some(filter),
                Some(other) => {
                    return Err(RepositoryError::InvalidParams {
                        resource: T::NAME,
                        message: format!("expected an object, got {other}"),
                    });
                }
            };

            let records = records.read().await;
            let mut found = Vec::new();
            for model in records.values() {
                let keep = match filter {
                    Some(filter) => matches_filter(model, filter)?,
                    None => true,
                };
                if keep {
                    found.push(Record::with_query(model.clone(), params.clone()));
                }
            }
            Ok(found)
        })
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Record<T>>> {
        Ok(self.records.read().await.get(id).cloned().map(Record::new))
    }

    async fn create(&self, mut model: T) -> RepositoryResult<T> {
        let mut records = self.records.write().await;

        let id = match model.id() {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                model.set_id(id.clone());
                id
            }
        };

        if records.contains_key(&id) {
            return Err(RepositoryError::Conflict { resource: T::NAME, id });
        }

        records.insert(id, model.clone());
        Ok(model)
    }

    async fn update(&self, model: T) -> RepositoryResult<T> {
        let id = model
            .id()
            .ok_or(RepositoryError::MissingId { resource: T::NAME })?
            .to_string();

        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(existing) => {
                *existing = model.clone();
                Ok(model)
            }
            None => Err(RepositoryError::NotFound { resource: T::NAME, id }),
        }
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound {
                resource: T::NAME,
                id: id.to_string(),
            })
    }
}
