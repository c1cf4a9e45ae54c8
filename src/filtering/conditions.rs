//! Client filters: `filter.<column>=<token>` entries turned into predicates.
//!
//! A token is `[$not:]<$op>[:value]`; a bare value is shorthand for `$eq:value`.
//!
//! ```text
//! filter.age=$gte:3              age >= 3
//! filter.age=$btw:3,5            age BETWEEN 3 AND 5
//! filter.color=$in:red,blue      color IN ('red', 'blue')
//! filter.name=$not:$ilike:mi     LOWER(name) NOT LIKE '%mi%'
//! filter.name=$null              name IS NULL
//! filter.status=a&filter.status=b    status = 'a' OR status = 'b'
//! ```
//!
//! Columns missing from `filterable_columns`, and operators the column does not
//! allow, are dropped without failing the request.

use std::collections::BTreeMap;

use sea_orm::{DatabaseBackend, sea_query::Condition};
use serde_json::Value as JsonValue;

use crate::config::{FilterSpec, PaginateConfig};
use crate::database::builder::QueryBuilder;
use crate::models::FilterValue;

use super::columns::resolve;
use super::predicate::FindOperator;
use super::values::escape_like_wildcards;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Btw,
    In,
    Null,
    ILike,
    Sw,
    Ew,
    Not,
}

impl FilterOperator {
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "$eq" => Self::Eq,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$btw" => Self::Btw,
            "$in" => Self::In,
            "$null" => Self::Null,
            "$ilike" => Self::ILike,
            "$sw" => Self::Sw,
            "$ew" => Self::Ew,
            "$not" => Self::Not,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Btw => "$btw",
            Self::In => "$in",
            Self::Null => "$null",
            Self::ILike => "$ilike",
            Self::Sw => "$sw",
            Self::Ew => "$ew",
            Self::Not => "$not",
        }
    }
}

/// A parsed filter token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterToken {
    pub operator: FilterOperator,
    pub negated: bool,
    pub value: String,
}

impl FilterToken {
    /// Parses `[$not:]<$op>[:value]`. Returns `None` for unknown operators.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (negated, rest) = match raw.strip_prefix("$not") {
            Some("") => (true, ""),
            Some(rest) if rest.starts_with(':') => (true, &rest[1..]),
            _ => (false, raw),
        };
        if !rest.starts_with('$') {
            return Some(Self {
                operator: FilterOperator::Eq,
                negated,
                value: rest.to_string(),
            });
        }
        let (op, value) = rest.split_once(':').unwrap_or((rest, ""));
        let operator = FilterOperator::from_token(op).filter(|op| *op != FilterOperator::Not)?;
        Some(Self {
            operator,
            negated,
            value: value.to_string(),
        })
    }

    /// Whether `spec` permits this token, including its negation.
    #[must_use]
    pub fn is_allowed(&self, spec: &FilterSpec) -> bool {
        spec.allows(self.operator) && (!self.negated || spec.allows(FilterOperator::Not))
    }

    /// Comparison the token stands for. `None` when the value does not fit the operator.
    #[must_use]
    pub fn to_find_operator(&self) -> Option<FindOperator> {
        let text = |s: &str| JsonValue::String(s.to_string());
        let op = match self.operator {
            FilterOperator::Eq => FindOperator::Eq(text(&self.value)),
            FilterOperator::Gt => FindOperator::Gt(text(&self.value)),
            FilterOperator::Gte => FindOperator::Gte(text(&self.value)),
            FilterOperator::Lt => FindOperator::Lt(text(&self.value)),
            FilterOperator::Lte => FindOperator::Lte(text(&self.value)),
            FilterOperator::Btw => {
                let (from, to) = self.value.split_once(',')?;
                FindOperator::Between(text(from), text(to))
            }
            FilterOperator::In => FindOperator::In(self.value.split(',').map(text).collect()),
            FilterOperator::Null => FindOperator::IsNull,
            FilterOperator::ILike => FindOperator::ILike(format!("%{}%", escape_like_wildcards(&self.value))),
            FilterOperator::Sw => FindOperator::ILike(format!("{}%", escape_like_wildcards(&self.value))),
            FilterOperator::Ew => FindOperator::ILike(format!("%{}", escape_like_wildcards(&self.value))),
            FilterOperator::Not => return None,
        };
        Some(if self.negated {
            FindOperator::Not(Box::new(op))
        } else {
            op
        })
    }
}

/// Adds one AND-ed OR-group per filtered column.
#[must_use]
pub fn apply_filters(
    mut builder: QueryBuilder,
    filter: Option<&BTreeMap<String, FilterValue>>,
    config: &PaginateConfig,
    backend: DatabaseBackend,
) -> QueryBuilder {
    let Some(filter) = filter else {
        return builder;
    };
    for (column, value) in filter {
        let Some(spec) = config.filterable_columns.get(column) else {
            tracing::debug!(column = %column, "ignoring filter on column that is not filterable");
            continue;
        };
        let operators: Vec<FindOperator> = value
            .tokens()
            .into_iter()
            .filter_map(|raw| {
                let token = FilterToken::parse(raw).filter(|t| t.is_allowed(spec));
                if token.is_none() {
                    tracing::debug!(column = %column, token = %raw, "ignoring unsupported filter token");
                }
                token?.to_find_operator()
            })
            .collect();
        if operators.is_empty() {
            continue;
        }
        let Some(resolved) = resolve(&mut builder, column) else {
            tracing::warn!(column = %column, "filterable column does not resolve against entity metadata");
            continue;
        };
        let group = operators.iter().fold(Condition::any(), |cond, op| {
            cond.add(op.to_expr(resolved.expr(), resolved.kind(), backend))
        });
        builder.and_where(group);
    }
    builder
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::database::metadata::{ColumnKind, ColumnMetadata, EntityMetadata, RelationMetadata};

    fn builder() -> QueryBuilder {
        let owner = Arc::new(
            EntityMetadata::new("owners")
                .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
                .column(ColumnMetadata::new("name", ColumnKind::Text)),
        );
        let metadata = EntityMetadata::new("cats")
            .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
            .column(ColumnMetadata::new("status", ColumnKind::Text))
            .column(ColumnMetadata::new("type", ColumnKind::Text))
            .column(ColumnMetadata::new("age", ColumnKind::Integer))
            .relation(RelationMetadata::new("owner", owner).on("owner_id", "id"));
        QueryBuilder::new(Arc::new(metadata), "__root")
    }

    fn config() -> PaginateConfig {
        PaginateConfig::new(["id"])
            .with_filterable_column("status", FilterSpec::Any)
            .with_filterable_column("type", FilterSpec::Any)
            .with_filterable_column("age", FilterSpec::operators([FilterOperator::Gte, FilterOperator::Lte]))
            .with_filterable_column("owner.name", FilterSpec::operators([FilterOperator::Eq]))
    }

    fn where_clause(filter: &BTreeMap<String, FilterValue>) -> (String, QueryBuilder) {
        let qb = apply_filters(builder(), Some(filter), &config(), DatabaseBackend::Sqlite);
        let sql = qb.to_statement(DatabaseBackend::Sqlite).sql;
        let clause = sql.split(" WHERE ").nth(1).unwrap_or_default().to_string();
        (clause, qb)
    }

    #[test]
    fn test_parse_tokens() {
        let token = FilterToken::parse("$gte:3").unwrap();
        assert_eq!(token.operator, FilterOperator::Gte);
        assert!(!token.negated);
        assert_eq!(token.value, "3");

        let token = FilterToken::parse("$not:$null").unwrap();
        assert_eq!(token.operator, FilterOperator::Null);
        assert!(token.negated);

        let token = FilterToken::parse("$not:milo").unwrap();
        assert_eq!(token.operator, FilterOperator::Eq);
        assert!(token.negated);
        assert_eq!(token.value, "milo");

        let token = FilterToken::parse("plain").unwrap();
        assert_eq!(token.operator, FilterOperator::Eq);
        assert_eq!(token.value, "plain");
    }

    #[test]
    fn test_value_keeps_colons() {
        let token = FilterToken::parse("$gt:2024-01-01T10:00:00Z").unwrap();
        assert_eq!(token.value, "2024-01-01T10:00:00Z");
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        assert!(FilterToken::parse("$regex:.*").is_none());
        assert!(FilterToken::parse("$not:$not:1").is_none());
    }

    #[test]
    fn test_malformed_between_is_dropped() {
        let token = FilterToken::parse("$btw:3").unwrap();
        assert!(token.to_find_operator().is_none());
    }

    #[test]
    fn test_pattern_operators_escape_wildcards() {
        let op = FilterToken::parse("$sw:50%").unwrap().to_find_operator().unwrap();
        assert_eq!(op, FindOperator::ILike("50\\%%".to_string()));
        let op = FilterToken::parse("$ew:a_b").unwrap().to_find_operator().unwrap();
        assert_eq!(op, FindOperator::ILike("%a\\_b".to_string()));
    }

    #[test]
    fn test_same_column_values_are_or_ed() {
        let mut filter = BTreeMap::new();
        filter.insert("status".to_string(), FilterValue::from(vec!["$eq:a", "$eq:b"]));
        let (sql, _) = where_clause(&filter);
        assert_eq!(sql, r#""__root"."status" = ? OR "__root"."status" = ?"#);
    }

    #[test]
    fn test_distinct_columns_are_and_ed() {
        let mut filter = BTreeMap::new();
        filter.insert("status".to_string(), FilterValue::from("$eq:a"));
        filter.insert("type".to_string(), FilterValue::from("$eq:x"));
        let (sql, _) = where_clause(&filter);
        assert!(sql.contains(r#""__root"."status" = ?"#), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
        assert!(sql.contains(r#""__root"."type" = ?"#), "{sql}");
        assert!(!sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn test_disallowed_operator_and_column_are_ignored() {
        let mut filter = BTreeMap::new();
        filter.insert("age".to_string(), FilterValue::from("$gt:3"));
        filter.insert("name".to_string(), FilterValue::from("milo"));
        let (sql, _) = where_clause(&filter);
        assert!(sql.is_empty(), "{sql}");
    }

    #[test]
    fn test_negation_requires_not_in_allow_list() {
        let mut filter = BTreeMap::new();
        filter.insert("age".to_string(), FilterValue::from("$not:$gte:3"));
        let (sql, _) = where_clause(&filter);
        assert!(sql.is_empty(), "{sql}");

        let mut filter = BTreeMap::new();
        filter.insert("status".to_string(), FilterValue::from("$not:$in:a,b"));
        let (sql, _) = where_clause(&filter);
        assert!(sql.starts_with("NOT "), "{sql}");
        assert!(sql.contains(r#""__root"."status" IN (?, ?)"#), "{sql}");
    }

    #[test]
    fn test_relation_filter_joins_once() {
        let mut filter = BTreeMap::new();
        filter.insert("owner.name".to_string(), FilterValue::from(vec!["Ann", "Bob"]));
        let (sql, qb) = where_clause(&filter);
        assert_eq!(sql, r#""__root_owner_rel"."name" = ? OR "__root_owner_rel"."name" = ?"#);
        assert!(qb.has_join("__root_owner_rel"));
    }

    #[test]
    fn test_null_filter() {
        let mut filter = BTreeMap::new();
        filter.insert("status".to_string(), FilterValue::from("$null"));
        let (sql, _) = where_clause(&filter);
        assert_eq!(sql, r#""__root"."status" IS NULL"#);
    }

    #[test]
    fn test_operator_token_round_trip() {
        for op in [FilterOperator::Eq, FilterOperator::Btw, FilterOperator::Ew, FilterOperator::Not] {
            assert_eq!(FilterOperator::from_token(op.as_token()), Some(op));
        }
    }
}
