//! Static, per-resource pagination configuration.
//!
//! A [`PaginateConfig`] is built once per resource (usually in a `fn` next to the
//! handler) and shared read-only by every request.
//!
//! ```rust,ignore
//! use pagecrate::{FilterOperator, FilterSpec, NullSort, PaginateConfig};
//!
//! let config = PaginateConfig::new(["id", "name", "owner.name"])
//!     .with_searchable_columns(["name", "color"])
//!     .with_filterable_column("age", FilterSpec::operators([FilterOperator::Gte, FilterOperator::Lte]))
//!     .with_filterable_column("color", FilterSpec::Any)
//!     .with_relations(["owner"])
//!     .with_null_sort(NullSort::Last)
//!     .with_max_limit(50);
//! ```

use std::collections::BTreeMap;

use crate::filtering::conditions::FilterOperator;
use crate::filtering::predicate::Predicate;
use crate::models::SortDirection;

/// Sentinel and default limit values.
pub struct PaginationLimit;

impl PaginationLimit {
    /// Return every matching row. Only honoured when `max_limit` is also `NO_PAGINATION`.
    pub const NO_PAGINATION: i64 = -1;
    /// Return only the total count, never rows.
    pub const COUNTER_ONLY: i64 = 0;
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const DEFAULT_MAX_LIMIT: i64 = 100;
}

/// Where `NULL` values land in an ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullSort {
    First,
    Last,
}

/// How the effective limit/offset is applied to the query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationType {
    #[default]
    LimitAndOffset,
    TakeAndSkip,
}

/// Allowed filter operators for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Every operator, including `$not`.
    Any,
    Operators(Vec<FilterOperator>),
}

impl FilterSpec {
    pub fn operators(ops: impl IntoIterator<Item = FilterOperator>) -> Self {
        Self::Operators(ops.into_iter().collect())
    }

    #[must_use]
    pub fn allows(&self, op: FilterOperator) -> bool {
        match self {
            Self::Any => true,
            Self::Operators(ops) => ops.contains(&op),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginateConfig {
    /// Columns a client may sort by. Must not be empty.
    pub sortable_columns: Vec<String>,
    pub searchable_columns: Vec<String>,
    /// Columns returned by default, and the set a client may narrow with `select`.
    pub select: Vec<String>,
    pub filterable_columns: BTreeMap<String, FilterSpec>,
    pub default_sort_by: Vec<(String, SortDirection)>,
    pub default_limit: i64,
    pub max_limit: i64,
    pub null_sort: Option<NullSort>,
    pub pagination_type: PaginationType,
    /// Dotted relation paths joined and selected into every row.
    pub relations: Vec<String>,
    /// Static base predicate AND-ed with everything the client sends.
    pub where_clause: Option<Predicate>,
    pub load_eager_relations: bool,
    pub with_deleted: bool,
    pub relative_path: bool,
    pub origin: Option<String>,
    pub ignore_search_by_in_query_param: bool,
    pub ignore_select_in_query_param: bool,
}

impl Default for PaginateConfig {
    fn default() -> Self {
        Self {
            sortable_columns: Vec::new(),
            searchable_columns: Vec::new(),
            select: Vec::new(),
            filterable_columns: BTreeMap::new(),
            default_sort_by: Vec::new(),
            default_limit: PaginationLimit::DEFAULT_LIMIT,
            max_limit: PaginationLimit::DEFAULT_MAX_LIMIT,
            null_sort: None,
            pagination_type: PaginationType::default(),
            relations: Vec::new(),
            where_clause: None,
            load_eager_relations: false,
            with_deleted: false,
            relative_path: false,
            origin: None,
            ignore_search_by_in_query_param: false,
            ignore_select_in_query_param: false,
        }
    }
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl PaginateConfig {
    pub fn new<I, S>(sortable_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sortable_columns: strings(sortable_columns),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_searchable_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_columns = strings(columns);
        self
    }

    #[must_use]
    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = strings(columns);
        self
    }

    #[must_use]
    pub fn with_filterable_column(mut self, column: impl Into<String>, spec: FilterSpec) -> Self {
        self.filterable_columns.insert(column.into(), spec);
        self
    }

    #[must_use]
    pub fn with_default_sort_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.default_sort_by.push((column.into(), direction));
        self
    }

    #[must_use]
    pub const fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_max_limit(mut self, limit: i64) -> Self {
        self.max_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_null_sort(mut self, null_sort: NullSort) -> Self {
        self.null_sort = Some(null_sort);
        self
    }

    #[must_use]
    pub const fn with_pagination_type(mut self, pagination_type: PaginationType) -> Self {
        self.pagination_type = pagination_type;
        self
    }

    #[must_use]
    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations = strings(relations);
        self
    }

    #[must_use]
    pub fn with_where(mut self, predicate: Predicate) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    #[must_use]
    pub const fn with_eager_relations(mut self, load: bool) -> Self {
        self.load_eager_relations = load;
        self
    }

    #[must_use]
    pub const fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    #[must_use]
    pub const fn with_relative_path(mut self, relative: bool) -> Self {
        self.relative_path = relative;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub const fn ignore_search_by_in_query_param(mut self, ignore: bool) -> Self {
        self.ignore_search_by_in_query_param = ignore;
        self
    }

    #[must_use]
    pub const fn ignore_select_in_query_param(mut self, ignore: bool) -> Self {
        self.ignore_select_in_query_param = ignore;
        self
    }
}
