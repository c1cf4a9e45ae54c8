use sea_orm::{
    DatabaseBackend, Order,
    sea_query::{Expr, NullOrdering, SimpleExpr},
};

use crate::config::{NullSort, PaginateConfig};
use crate::database::builder::QueryBuilder;
use crate::errors::PaginateError;
use crate::models::SortDirection;

use super::columns::{ResolvedColumn, quote_virtual_column, resolve};

/// Validated ordering for a request.
///
/// Entries whose column is not sortable or whose direction is not `ASC`/`DESC`
/// are dropped. With nothing left, `default_sort_by` is used, and failing that
/// the first sortable column ascending.
///
/// # Errors
///
/// [`PaginateError::Misconfigured`] when `sortable_columns` is empty.
pub fn sort_by(
    requested: &[(String, String)],
    config: &PaginateConfig,
) -> Result<Vec<(String, SortDirection)>, PaginateError> {
    let Some(first_sortable) = config.sortable_columns.first() else {
        tracing::debug!("paginate config has no sortable columns");
        return Err(PaginateError::misconfigured("sortable_columns must not be empty"));
    };
    let valid: Vec<(String, SortDirection)> = requested
        .iter()
        .filter_map(|(column, direction)| {
            let direction = SortDirection::parse(direction);
            let sortable = config.sortable_columns.contains(column);
            if direction.is_none() || !sortable {
                tracing::debug!(column = %column, "ignoring invalid sort entry");
            }
            Some((column.clone(), direction.filter(|_| sortable)?))
        })
        .collect();
    if !valid.is_empty() {
        return Ok(valid);
    }
    if !config.default_sort_by.is_empty() {
        return Ok(config.default_sort_by.clone());
    }
    Ok(vec![(first_sortable.clone(), SortDirection::Asc)])
}

fn order_expr(column: &ResolvedColumn, backend: DatabaseBackend) -> SimpleExpr {
    if column.is_virtual() && column.column.expression.is_none() {
        return Expr::cust(quote_virtual_column(&column.alias, backend));
    }
    column.expr()
}

/// Adds ORDER BY entries in order, with the configured null placement.
#[must_use]
pub fn apply_sort(
    mut builder: QueryBuilder,
    sort_by: &[(String, SortDirection)],
    config: &PaginateConfig,
    backend: DatabaseBackend,
) -> QueryBuilder {
    for (column, direction) in sort_by {
        let Some(resolved) = resolve(&mut builder, column) else {
            tracing::warn!(column = %column, "sortable column does not resolve against entity metadata");
            continue;
        };
        let expr = order_expr(&resolved, backend);
        let order = Order::from(*direction);
        match (config.null_sort, backend) {
            (None, _) => {
                builder.add_order_by(expr, order, None);
            }
            // MySQL has no NULLS FIRST/LAST, so order on the null test first.
            (Some(null_sort), DatabaseBackend::MySql) => {
                let nulls_key = match null_sort {
                    NullSort::Last => Expr::expr(expr.clone()).is_null(),
                    NullSort::First => Expr::expr(expr.clone()).is_not_null(),
                };
                builder.add_order_by(nulls_key, Order::Asc, None);
                builder.add_order_by(expr, order, None);
            }
            (Some(null_sort), _) => {
                let nulls = match null_sort {
                    NullSort::First => NullOrdering::First,
                    NullSort::Last => NullOrdering::Last,
                };
                builder.add_order_by(expr, order, Some(nulls));
            }
        }
    }
    builder
}
