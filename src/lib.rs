//! # pagecrate
//!
//! Query-string driven pagination for Axum and Sea-ORM: page and limit, sorting,
//! search, filters and column selection, with response meta data and navigation
//! links that encode the full request.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use axum::{Router, extract::State, routing::get};
//! use pagecrate::{
//!     EntityMetadata, FilterOperator, FilterSpec, PaginateConfig, PaginateError, PaginateQuery,
//!     Paginated, paginate_json,
//! };
//!
//! async fn list_cats(
//!     State(db): State<DatabaseConnection>,
//!     query: PaginateQuery,
//! ) -> Result<Paginated<serde_json::Value>, PaginateError> {
//!     let config = PaginateConfig::new(["id", "name", "age"])
//!         .with_searchable_columns(["name", "color"])
//!         .with_filterable_column("age", FilterSpec::operators([FilterOperator::Gte, FilterOperator::Lte]))
//!         .with_relations(["owner"]);
//!     let cats = Arc::new(EntityMetadata::from_entity::<cat::Entity>());
//!     paginate_json(&query, cats, &config, &db).await
//! }
//!
//! let app = Router::new().route("/cats", get(list_cats)).with_state(db);
//! ```

pub mod config;
pub mod database;
pub mod errors;
pub mod extract;
pub mod filtering;
pub mod models;
pub mod operations;

pub use config::{FilterSpec, NullSort, PaginateConfig, PaginationLimit, PaginationType};
pub use database::{
    ColumnKind, ColumnMetadata, EmbeddedMetadata, EntityMetadata, QueryBuilder, ROOT_ALIAS,
    RelationMetadata, Source,
};
pub use errors::PaginateError;
pub use extract::PaginateParams;
pub use filtering::{FilterOperator, FindOperator, Predicate};
pub use models::{FilterValue, PaginateQuery, Paginated, PaginatedLinks, PaginatedMeta, SortDirection};
pub use operations::{paginate, paginate_json};
pub use serde_with;
