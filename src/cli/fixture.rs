//! Demo models and YAML fixtures for `nydus simulate`.
//!
//! A purchase references one book by id; the `book$` relation reads it
//! through the book repository.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tokio::fs;

use crate::domain::errors::RelationResult;
use crate::domain::models::{CacheKind, CacheScope, Model, RelationRef, RelationTable};

/// A book in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
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

/// A purchase of one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    #[serde(default)]
    pub id: Option<String>,
    pub book_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
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

impl Purchase {
    /// The purchased book.
    pub const BOOK: RelationRef<Self, Book> = RelationRef::new("book$");
}

/// Relation table for [`Purchase`] under the given cache policy.
///
/// `cache` of `None` declares no policy. With `by_book` the relation passes
/// `{"id": bookId}` as params; otherwise it has no params function.
pub fn purchase_relations(
    cache: Option<(CacheKind, CacheScope)>,
    by_book: bool,
) -> RelationResult<RelationTable<Purchase>> {
    let mut relation = Purchase::BOOK.declare();
    if by_book {
        relation = relation.params(|purchase: &Purchase, _| json!({ "id": purchase.book_id }));
    }
    relation = match cache {
        Some((CacheKind::Soft, scope)) => relation.soft_cache(scope),
        Some((CacheKind::Hard, scope)) => relation.hard_cache(scope),
        None => relation,
    };

    RelationTable::builder().relation(relation).build()
}

/// Books and purchases loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Fixture {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

impl Fixture {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    /// Parse a fixture from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let fixture: Self = serde_yaml::from_str(content)?;
        if let Some(purchase) = fixture.purchases.iter().find(|p| p.book_id.is_empty()) {
            anyhow::bail!("purchase {:?} has an empty bookId", purchase.id);
        }
        Ok(fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Record;

    const FIXTURE: &str = r"
books:
  - id: b1
    title: Dune
    author: Frank Herbert
  - id: b2
    title: Hyperion
purchases:
  - id: p1
    bookId: b1
    quantity: 2
  - bookId: b2
";

    #[test]
    fn test_parse_fixture() {
        let fixture = Fixture::parse(FIXTURE).unwrap();
        assert_eq!(fixture.books.len(), 2);
        assert_eq!(fixture.books[1].author, None);
        assert_eq!(fixture.purchases[0].quantity, 2);
        assert_eq!(fixture.purchases[1].quantity, 1);
        assert_eq!(fixture.purchases[1].id, None);
    }

    #[test]
    fn test_parse_rejects_empty_book_id() {
        let err = Fixture::parse("purchases:\n  - id: p1\n    bookId: ''\n").unwrap_err();
        assert!(err.to_string().contains("empty bookId"));
    }

    #[test]
    fn test_purchase_relations_by_book_params() {
        let table = purchase_relations(Some((CacheKind::Hard, CacheScope::Field)), true).unwrap();
        let declaration = table.get("book$").unwrap();
        assert_eq!(declaration.cache(CacheKind::Hard), Some(CacheScope::Field));
        assert_eq!(declaration.cache(CacheKind::Soft), None);

        let purchase = Record::new(Purchase {
            id: Some("p1".into()),
            book_id: "b7".into(),
            quantity: 1,
        });
        assert_eq!(declaration.resolve_params(&purchase), Some(json!({"id": "b7"})));
    }

    #[test]
    fn test_purchase_relations_without_params() {
        let table = purchase_relations(None, false).unwrap();
        let declaration = table.get("book$").unwrap();
        assert!(!declaration.has_params());
        assert_eq!(declaration.cache(CacheKind::Soft), None);
    }

    #[tokio::test]
    async fn test_load_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yaml");
        tokio::fs::write(&path, FIXTURE).await.unwrap();

        let fixture = Fixture::load(&path).await.unwrap();
        assert_eq!(fixture.purchases.len(), 2);

        assert!(Fixture::load(dir.path().join("missing.yaml")).await.is_err());
    }
}
