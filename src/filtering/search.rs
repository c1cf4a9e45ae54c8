use sea_orm::{DatabaseBackend, sea_query::Condition};

use crate::config::PaginateConfig;
use crate::database::builder::QueryBuilder;

use super::columns::resolve;
use super::predicate::ilike;
use super::values::escape_like_wildcards;

// Basic safety limit
const MAX_SEARCH_QUERY_LENGTH: usize = 10_000;

/// Columns a search runs against.
///
/// The client's `searchBy` narrows the configured list unless the config ignores it.
/// Returns the columns and whether they differ from the configured list.
#[must_use]
pub fn search_columns(search_by: Option<&[String]>, config: &PaginateConfig) -> (Vec<String>, bool) {
    match search_by {
        Some(requested) if !config.ignore_search_by_in_query_param => {
            let columns: Vec<String> = requested
                .iter()
                .filter(|c| config.searchable_columns.contains(*c))
                .cloned()
                .collect();
            let narrowed = columns != config.searchable_columns;
            (columns, narrowed)
        }
        _ => (config.searchable_columns.clone(), false),
    }
}

fn truncate(term: &str) -> &str {
    if term.len() <= MAX_SEARCH_QUERY_LENGTH {
        return term;
    }
    let mut end = MAX_SEARCH_QUERY_LENGTH;
    while !term.is_char_boundary(end) {
        end -= 1;
    }
    &term[..end]
}

/// AND-s one OR-group of `%term%` matches across `columns`.
#[must_use]
pub fn apply_search(
    mut builder: QueryBuilder,
    search: Option<&str>,
    columns: &[String],
    backend: DatabaseBackend,
) -> QueryBuilder {
    let Some(term) = search.filter(|s| !s.is_empty()) else {
        return builder;
    };
    let pattern = format!("%{}%", escape_like_wildcards(truncate(term)));
    let mut group = Condition::any();
    let mut matched = false;
    for column in columns {
        let Some(resolved) = resolve(&mut builder, column) else {
            tracing::warn!(column = %column, "searchable column does not resolve against entity metadata");
            continue;
        };
        group = group.add(ilike(resolved.expr(), &pattern, backend));
        matched = true;
    }
    if matched {
        builder.and_where(group);
    }
    builder
}
