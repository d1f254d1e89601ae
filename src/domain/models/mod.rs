pub mod cache_policy;
pub mod config;
pub mod lazy_collection;
pub mod model;
pub mod record;
pub mod relation;

pub use cache_policy::{CacheKind, CacheScope};
pub use config::{CacheConfig, Config, LogFormat, LoggingConfig, RotationPolicy};
pub use lazy_collection::{Collection, LazyCollection};
pub use model::Model;
pub use record::Record;
pub use relation::{
    ParamsFn, Relation, RelationDeclaration, RelationRef, RelationTable, RelationTableBuilder,
    RepositoryId, RepositoryKey, ResourceType,
};
