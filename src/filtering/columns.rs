//! Dotted column paths: parsing, classification and SQL aliases.
//!
//! A column path such as `owner.home.street` is split into an anchor segment
//! (`owner`) and the remaining property path (`home.street`). The anchor is
//! classified against [`EntityMetadata`] as a relation, an embedded group or a
//! plain column, and the pair is turned into the alias the generated SQL uses.
//! Relation hops are joined as `<alias>_<segment>_rel`, so the same path always
//! produces the same alias and a join is never added twice.

use sea_orm::{
    DatabaseBackend,
    sea_query::{Alias, Expr, SimpleExpr},
};

use crate::database::builder::{QueryBuilder, relation_alias};
use crate::database::metadata::{ColumnKind, ColumnMetadata, EntityMetadata, VirtualExpression};

/// A column path split into anchor and remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProperties {
    /// Relation or embedded anchor, absent for a root column.
    pub property_path: Option<String>,
    /// Remaining path, dot-joined, with the `(...)` embedded marker stripped.
    pub property_name: String,
    /// The remainder crosses more than one relation hop.
    pub is_nested: bool,
    /// Canonical `anchor.rest` form.
    pub column: String,
}

impl ColumnProperties {
    #[must_use]
    pub fn parse(column: &str) -> Self {
        let mut segments = column.split('.');
        let first = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return Self {
                property_path: None,
                property_name: first.to_string(),
                is_nested: false,
                column: first.to_string(),
            };
        }
        let joined = rest.join(".");
        let is_nested = !joined.starts_with('(') && rest.len() > 1;
        let property_name = joined.replacen('(', "", 1).replacen(')', "", 1);
        Self {
            column: format!("{first}.{property_name}"),
            property_path: Some(first.to_string()),
            property_name,
            is_nested,
        }
    }
}

/// Alias of a column in generated SQL.
///
/// `expression` is the computed-column SQL builder, if the column has one.
#[must_use]
pub fn fix_column_alias(
    properties: &ColumnProperties,
    alias: &str,
    is_relation: bool,
    is_virtual: bool,
    is_embedded: bool,
    expression: Option<&VirtualExpression>,
) -> String {
    let path = properties.property_path.as_deref().unwrap_or_default();
    let name = &properties.property_name;
    if is_relation {
        let relation_table = format!("{alias}_{path}_rel");
        if is_virtual && let Some(expression) = expression {
            return format!("({})", expression(&relation_table));
        }
        if is_virtual || properties.is_nested {
            if let Some((hops, last)) = name.rsplit_once('.') {
                let hops: Vec<String> = hops.split('.').map(|s| format!("{s}_rel")).collect();
                return format!("{relation_table}_{}.{last}", hops.join("_"));
            }
            return format!("{relation_table}_{name}");
        }
        return format!("{relation_table}.{name}");
    }
    if is_virtual {
        return match expression {
            Some(expression) => format!("({})", expression(alias)),
            None => format!("{alias}_{name}"),
        };
    }
    if is_embedded {
        return format!("{alias}.{path}.{name}");
    }
    format!("{alias}.{name}")
}

/// Quotes a computed-column alias for raw SQL fragments.
#[must_use]
pub fn quote_virtual_column(alias: &str, backend: DatabaseBackend) -> String {
    match backend {
        DatabaseBackend::MySql => format!("`{alias}`"),
        _ => format!("\"{alias}\""),
    }
}

/// A column path resolved against an entity and its relations.
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub properties: ColumnProperties,
    pub alias: String,
    /// Relation hops that must be joined, from the root.
    pub join_path: Vec<String>,
    /// Alias of the table owning the column.
    pub table_alias: String,
    pub column: ColumnMetadata,
    pub is_relation: bool,
    pub is_embedded: bool,
}

impl ResolvedColumn {
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.column.is_virtual
    }

    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        self.column.kind
    }

    /// Expression usable in WHERE, ORDER BY and SELECT.
    #[must_use]
    pub fn expr(&self) -> SimpleExpr {
        if self.column.is_virtual {
            return match self.column.expression {
                Some(_) => Expr::cust(self.alias.clone()),
                None => Expr::col(Alias::new(&self.alias)).into(),
            };
        }
        Expr::col((Alias::new(&self.table_alias), Alias::new(&self.column.name))).into()
    }
}

/// Classifies `column` against the builder's entity without touching its joins.
#[must_use]
pub fn classify(metadata: &EntityMetadata, alias: &str, column: &str) -> Option<ResolvedColumn> {
    let properties = ColumnProperties::parse(column);
    let (join_path, table_alias, found, is_relation, is_embedded) = match &properties.property_path {
        None => {
            let found = metadata.find_column(&properties.property_name)?;
            (Vec::new(), alias.to_string(), found, false, false)
        }
        Some(path) if metadata.find_relation(path).is_some() => {
            let mut hops = vec![path.clone()];
            let column_path = if properties.is_nested {
                let (inner, last) = properties.property_name.rsplit_once('.')?;
                hops.extend(inner.split('.').map(str::to_string));
                last.to_string()
            } else {
                properties.property_name.clone()
            };
            let relation = metadata.find_relation_path(hops.iter().map(String::as_str))?;
            let found = relation.target.find_column_by_path(&column_path)?;
            let hop_refs: Vec<&str> = hops.iter().map(String::as_str).collect();
            let table_alias = relation_alias(alias, &hop_refs);
            (hops, table_alias, found, true, false)
        }
        Some(path) if metadata.find_embedded(path).is_some() => {
            let found = metadata.find_column_by_path(&properties.column)?;
            (Vec::new(), alias.to_string(), found, false, true)
        }
        Some(_) => return None,
    };
    let alias = fix_column_alias(
        &properties,
        alias,
        is_relation,
        found.is_virtual,
        is_embedded,
        found.expression.as_ref(),
    );
    Some(ResolvedColumn {
        properties,
        alias,
        join_path,
        table_alias,
        column: found.clone(),
        is_relation,
        is_embedded,
    })
}

/// Resolves `column` and left-joins any relation hop it needs.
///
/// Returns `None` for paths that do not exist on the entity.
pub fn resolve(builder: &mut QueryBuilder, column: &str) -> Option<ResolvedColumn> {
    let resolved = classify(builder.metadata(), builder.alias(), column)?;
    if !resolved.join_path.is_empty() {
        let hops: Vec<&str> = resolved.join_path.iter().map(String::as_str).collect();
        builder.left_join(&hops)?;
    }
    Some(resolved)
}
