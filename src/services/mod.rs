pub mod relation_catalog;
pub mod relation_resolver;
pub mod repository_locator;
pub mod request_scope;

pub use relation_catalog::RelationCatalog;
pub use relation_resolver::RelationResolver;
pub use repository_locator::{RepositoryLocator, ResolvedRepository};
pub use request_scope::{CacheRegistry, CacheStats, RequestScope, ScopeReport};
