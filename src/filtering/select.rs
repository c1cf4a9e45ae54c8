//! Column selection.
//!
//! `PaginateConfig::select` lists the columns returned by default; a client's
//! `select` can only narrow that list. `*` stands for every root column and
//! `owner.*` for every column of the `owner` relation. A narrowed selection that
//! drops a root primary-key column is not honoured and the configured list is
//! returned instead.

use std::collections::BTreeSet;

use sea_orm::sea_query::SimpleExpr;

use crate::config::PaginateConfig;
use crate::database::builder::QueryBuilder;
use crate::database::metadata::EntityMetadata;

use super::columns::resolve;

/// Expands `*` and `relation.*` entries into concrete column paths, keeping order.
fn expand(columns: &[String], metadata: &EntityMetadata) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |column: String| {
        if !expanded.contains(&column) {
            expanded.push(column);
        }
    };
    for column in columns {
        if column == "*" {
            metadata.selectable_columns().into_iter().for_each(|(path, _)| push(path));
        } else if let Some(relation_path) = column.strip_suffix(".*") {
            match metadata.find_relation_path(relation_path.split('.')) {
                Some(relation) => relation
                    .target
                    .selectable_columns()
                    .into_iter()
                    .for_each(|(path, _)| push(format!("{relation_path}.{path}"))),
                None => tracing::warn!(column = %column, "select wildcard does not name a relation"),
            }
        } else {
            push(column.clone());
        }
    }
    expanded
}

fn matches(pattern: &str, column: &str) -> bool {
    if pattern == column {
        return true;
    }
    if pattern == "*" {
        return !column.contains('.');
    }
    pattern
        .strip_suffix(".*")
        .and_then(|relation| column.strip_prefix(relation))
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|rest| !rest.is_empty())
}

/// Applies the selection and returns what `meta.select` should report.
///
/// `meta.select` is `Some` only when the honoured selection differs from the configured one.
#[must_use]
pub fn apply_select(
    mut builder: QueryBuilder,
    requested: Option<&[String]>,
    config: &PaginateConfig,
) -> (QueryBuilder, Option<Vec<String>>) {
    if config.select.is_empty() {
        return (builder, None);
    }
    let configured = expand(&config.select, builder.metadata());
    let narrowed: Option<Vec<String>> = requested
        .filter(|_| !config.ignore_select_in_query_param)
        .map(|patterns| {
            configured
                .iter()
                .filter(|column| patterns.iter().any(|p| matches(p, column)))
                .cloned()
                .collect()
        });

    let primary: BTreeSet<String> = builder
        .metadata()
        .primary_columns()
        .into_iter()
        .map(|c| c.property.clone())
        .collect();
    let honoured = match narrowed {
        Some(columns) if primary.iter().all(|pk| columns.contains(pk)) => columns,
        Some(_) => {
            tracing::debug!("ignoring select without every primary key column");
            configured.clone()
        }
        None => configured.clone(),
    };

    let mut selection: Vec<(SimpleExpr, String)> = Vec::with_capacity(honoured.len());
    for column in &honoured {
        match resolve(&mut builder, column) {
            Some(resolved) if !(resolved.is_virtual() && resolved.column.expression.is_none()) => {
                if !resolved.join_path.is_empty() {
                    let hops: Vec<&str> = resolved.join_path.iter().map(String::as_str).collect();
                    builder.left_join_and_select(&hops);
                }
                selection.push((resolved.expr(), resolved.properties.column.clone()));
            }
            _ => tracing::warn!(column = %column, "select column does not resolve against entity metadata"),
        }
    }
    builder.select(selection);

    let meta = (honoured != configured).then_some(honoured);
    (builder, meta)
}
