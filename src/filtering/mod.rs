//! # Query shaping
//!
//! Every stage takes the [`QueryBuilder`](crate::database::builder::QueryBuilder)
//! by value and returns it with its part added:
//!
//! - **[`select`]**: configured columns, optionally narrowed by the client
//! - **[`conditions`]**: `filter.<column>=<token>` predicates
//! - **[`pagination`]**: effective limit/offset
//! - **[`sort`]**: validated ORDER BY with null placement
//! - **[`search`]**: one OR-group of case-insensitive matches
//!
//! Column paths are resolved by [`columns`], which adds the left joins a path
//! needs; static predicates from configuration go through [`predicate`].
//!
//! ## Query Parameter Examples
//!
//! ```rust,ignore
//! // Page 2 of ten, newest first, then by name
//! GET /cats?page=2&limit=10&sortBy=createdAt:DESC&sortBy=name:ASC
//!
//! // Search two columns only
//! GET /cats?search=milo&searchBy=name,owner.name
//!
//! // Filters: age 3 to 5, color not black, owner known
//! GET /cats?filter.age=$btw:3,5&filter.color=$not:black&filter.owner.name=$not:$null
//!
//! // Narrow the returned columns
//! GET /cats?select=id,name,owner.*
//! ```

pub mod columns;
pub mod conditions;
pub mod pagination;
pub mod predicate;
pub mod search;
pub mod select;
pub mod sort;
pub mod values;

pub use columns::{ColumnProperties, ResolvedColumn, fix_column_alias, resolve};
pub use conditions::{FilterOperator, FilterToken, apply_filters};
pub use pagination::{PageWindow, apply_pagination};
pub use predicate::{FindOperator, Predicate};
pub use search::apply_search;
pub use select::apply_select;
pub use sort::apply_sort;
pub use values::escape_like_wildcards;
