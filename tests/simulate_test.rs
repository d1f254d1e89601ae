use nydus::cli::commands::simulate::{simulate, CachePolicyArg, ScopeArg, SimulateArgs};
use nydus::cli::fixture::Fixture;
use nydus::domain::models::CacheConfig;
use std::path::PathBuf;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/bookstore.yaml")
}

fn args(cache: CachePolicyArg, scope: ScopeArg, by_book: bool) -> SimulateArgs {
    SimulateArgs {
        fixture: fixture_path(),
        cache,
        scope,
        by_book,
    }
}

#[tokio::test]
async fn test_bookstore_fixture_loads() {
    let fixture = Fixture::load(fixture_path()).await.unwrap();
    assert_eq!(fixture.books.len(), 3);
    assert_eq!(fixture.purchases.len(), 5);
}

#[tokio::test]
async fn test_policies_over_bookstore() {
    // (cache, scope, by_book) -> expected fetches
    let cases = [
        (CachePolicyArg::None, ScopeArg::Request, false, 5),
        (CachePolicyArg::Soft, ScopeArg::Request, false, 1),
        (CachePolicyArg::Hard, ScopeArg::Request, false, 1),
        (CachePolicyArg::Soft, ScopeArg::Request, true, 3),
        (CachePolicyArg::Hard, ScopeArg::Field, true, 5),
    ];

    for (cache, scope, by_book, fetches) in cases {
        let args = args(cache, scope, by_book);
        let fixture = Fixture::load(&args.fixture).await.unwrap();
        let out = simulate(&args, fixture, &CacheConfig::default()).await.unwrap();

        assert_eq!(out.fetches, fetches, "{cache:?} {scope:?} by_book={by_book}");
        assert_eq!(out.rows.len(), 5);
        assert!(out.rows.iter().all(|row| row.title.is_some()));
    }
}

#[tokio::test]
async fn test_low_threshold_still_resolves() {
    let args = args(CachePolicyArg::Soft, ScopeArg::Request, true);
    let fixture = Fixture::load(&args.fixture).await.unwrap();
    let config = CacheConfig {
        registry_warn_threshold: 1,
    };

    let out = simulate(&args, fixture, &config).await.unwrap();
    assert_eq!(out.soft.entries, 3);
    assert_eq!(out.soft.hits, 2);
}
