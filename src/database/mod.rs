pub mod builder;
pub mod metadata;

pub use builder::{QueryBuilder, ROOT_ALIAS, Source};
pub use metadata::{ColumnKind, ColumnMetadata, EmbeddedMetadata, EntityMetadata, RelationMetadata};
