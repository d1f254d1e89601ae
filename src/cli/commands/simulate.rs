//! Implementation of the `nydus simulate` command.
//!
//! Loads a fixture into in-memory repositories, resolves `book$` on every
//! purchase inside one request scope and reports how many fetches the
//! chosen cache policy let through.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use futures::future::try_join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::memory::InMemoryRepository;
use crate::adapters::traced::TracedRepository;
use crate::cli::fixture::{purchase_relations, Book, Fixture, Purchase};
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{CacheConfig, CacheKind, CacheScope, LazyCollection, Model};
use crate::domain::ports::Repository;
use crate::services::{
    CacheStats, RelationCatalog, RelationResolver, RepositoryLocator, RequestScope,
};

/// Cache kind declared on the simulated relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CachePolicyArg {
    None,
    Soft,
    Hard,
}

/// Scope of the declared cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Request,
    Field,
    Instance,
}

impl From<ScopeArg> for CacheScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Request => Self::Request,
            ScopeArg::Field => Self::Field,
            ScopeArg::Instance => Self::Instance,
        }
    }
}

/// Arguments of `nydus simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// YAML fixture with `books` and `purchases`
    #[arg(short, long)]
    pub fixture: PathBuf,

    /// Cache policy declared on `book$`
    #[arg(long, value_enum, default_value = "none")]
    pub cache: CachePolicyArg,

    /// Scope of the cache policy
    #[arg(long, value_enum, default_value = "request")]
    pub scope: ScopeArg,

    /// Pass {"id": bookId} as params instead of fetching every book
    #[arg(long)]
    pub by_book: bool,
}

impl SimulateArgs {
    fn cache_policy(&self) -> Option<(CacheKind, CacheScope)> {
        let scope = CacheScope::from(self.scope);
        match self.cache {
            CachePolicyArg::None => None,
            CachePolicyArg::Soft => Some((CacheKind::Soft, scope)),
            CachePolicyArg::Hard => Some((CacheKind::Hard, scope)),
        }
    }
}

/// One resolved purchase.
#[derive(Debug, Serialize)]
pub struct PurchaseRow {
    pub purchase: String,
    pub book_id: String,
    pub title: Option<String>,
    /// Purchases with the same number share one lazy collection.
    pub handle: usize,
    pub records: usize,
}

/// Result of a simulation run.
#[derive(Debug, Serialize)]
pub struct SimulateOutput {
    pub policy: String,
    pub rows: Vec<PurchaseRow>,
    pub find_all_calls: usize,
    pub fetches: usize,
    pub soft: CacheStats,
    pub hard: CacheStats,
}

impl CommandOutput for SimulateOutput {
    fn to_human(&self) -> String {
        let mut purchases = table(&["Purchase", "Book", "Title", "Handle", "Records"]);
        for row in &self.rows {
            purchases.add_row(vec![
                row.purchase.clone(),
                row.book_id.clone(),
                row.title.as_deref().map_or_else(|| "-".to_string(), |t| truncate(t, 40)),
                format!("#{}", row.handle),
                row.records.to_string(),
            ]);
        }

        let mut lines = vec![format!("Policy: {}", self.policy), purchases.to_string()];
        lines.push(format!(
            "find_all calls: {}, fetches: {}",
            self.find_all_calls, self.fetches
        ));
        lines.push(format!(
            "soft cache: {} hits, {} misses; hard cache: {} hits, {} misses",
            self.soft.hits, self.soft.misses, self.hard.hits, self.hard.misses
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SimulateArgs, cache_config: &CacheConfig, json_mode: bool) -> Result<()> {
    let fixture = Fixture::load(&args.fixture).await?;
    let result = simulate(&args, fixture, cache_config).await?;
    output(&result, json_mode);
    Ok(())
}

/// Run the simulation over an already loaded fixture.
pub async fn simulate(
    args: &SimulateArgs,
    fixture: Fixture,
    cache_config: &CacheConfig,
) -> Result<SimulateOutput> {
    let policy = args.cache_policy();

    let books = Arc::new(TracedRepository::new(Arc::new(
        InMemoryRepository::<Book>::with_records(fixture.books),
    )));
    let purchases = InMemoryRepository::<Purchase>::with_records(fixture.purchases);

    let mut locator = RepositoryLocator::new();
    locator.bind::<Book, _>(Arc::clone(&books))?;

    let mut catalog = RelationCatalog::new();
    catalog.register(purchase_relations(policy, args.by_book)?)?;

    let resolver = RelationResolver::new(Arc::new(locator), Arc::new(catalog));
    let scope = RequestScope::with_config(cache_config);

    let purchases = purchases
        .find_all(None)
        .await
        .context("Failed to load purchases")?;

    let handles = resolver
        .relation_all(Purchase::BOOK, purchases.iter().map(|purchase| &**purchase), &scope)
        .context("Failed to resolve book$")?;
    let resolved = try_join_all(handles.iter().cloned())
        .await
        .context("Failed to fetch books")?;

    let labels = handle_labels(&handles);
    let mut rows = Vec::with_capacity(purchases.len());
    for ((purchase, found), handle) in purchases.iter().zip(&resolved).zip(labels) {
        let title = found
            .iter()
            .find(|book| book.id.as_deref() == Some(purchase.book_id.as_str()))
            .map(|book| book.title.clone());

        rows.push(PurchaseRow {
            purchase: purchase.id.clone().unwrap_or_default(),
            book_id: purchase.book_id.clone(),
            title,
            handle,
            records: found.len(),
        });
    }

    let report = scope.dispose();
    Ok(SimulateOutput {
        policy: match policy {
            Some((kind, cache_scope)) => format!("{kind} {cache_scope}"),
            None => "no cache".to_string(),
        },
        rows,
        find_all_calls: books.calls(),
        fetches: books.fetches(),
        soft: report.soft,
        hard: report.hard,
    })
}

/// Number the handles so that identical handles share a number, starting at 1.
fn handle_labels<T: Model>(handles: &[LazyCollection<T>]) -> Vec<usize> {
    let mut distinct: Vec<&LazyCollection<T>> = Vec::new();
    handles
        .iter()
        .map(|handle| {
            match distinct.iter().position(|seen| seen.same_handle(handle)) {
                Some(index) => index + 1,
                None => {
                    distinct.push(handle);
                    distinct.len()
                }
            }
        })
        .collect()
}
