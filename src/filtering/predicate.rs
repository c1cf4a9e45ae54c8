//! Predicate trees and their translation to Sea-Query conditions.
//!
//! A [`Predicate`] is either a leaf comparison on a column path or an AND/OR
//! group of predicates. Trees are usually built once from configuration,
//! either in Rust or from JSON:
//!
//! ```rust,ignore
//! // name = 'Milo' AND (owner.name = 'Ann' OR age >= 3)
//! let predicate = Predicate::from_json(&json!({
//!     "name": "Milo",
//!     "$or": [{ "owner": { "name": "Ann" } }, { "age": { "$gte": 3 } }]
//! }));
//! ```
//!
//! [`flatten`] walks the tree, resolves every leaf path through the column
//! resolver (joining relations on the way) and returns one condition with all
//! values bound as parameters.

use sea_orm::{
    DatabaseBackend, Value,
    sea_query::{Alias, Condition, Expr, Func, LikeExpr, SimpleExpr},
};
use serde_json::{Map, Value as JsonValue};

use crate::database::builder::QueryBuilder;
use crate::database::metadata::ColumnKind;

use super::columns::resolve;
use super::values::coerce;

/// Comparison applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FindOperator {
    Eq(JsonValue),
    Gt(JsonValue),
    Gte(JsonValue),
    Lt(JsonValue),
    Lte(JsonValue),
    Between(JsonValue, JsonValue),
    In(Vec<JsonValue>),
    IsNull,
    /// Case-insensitive pattern; `%` and `_` are wildcards, `\` escapes.
    ILike(String),
    Not(Box<FindOperator>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Leaf { path: String, op: FindOperator },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn leaf(path: impl Into<String>, op: FindOperator) -> Self {
        Self::Leaf { path: path.into(), op }
    }

    pub fn eq(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::leaf(path, FindOperator::Eq(value.into()))
    }

    /// Builds a tree from JSON: objects are AND groups, arrays are OR groups.
    ///
    /// Nested objects extend the column path (`{"owner": {"name": "x"}}` is
    /// `owner.name = 'x'`) unless every key starts with `$`, in which case the
    /// object is an operator leaf such as `{"$gte": 3}` or `{"$not": {"$null": true}}`.
    /// A `"$or"` or `"$and"` key inside an object holds a nested group.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Array(items) => {
                let groups: Vec<Self> = items.iter().filter_map(Self::from_json).collect();
                (!groups.is_empty()).then_some(Self::Or(groups))
            }
            JsonValue::Object(map) => {
                let mut leaves = Vec::new();
                flatten_object("", map, &mut leaves);
                (!leaves.is_empty()).then_some(Self::And(leaves))
            }
            _ => None,
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn is_operator_object(map: &Map<String, JsonValue>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn flatten_object(prefix: &str, map: &Map<String, JsonValue>, out: &mut Vec<Predicate>) {
    for (key, value) in map {
        if key == "$or" || key == "$and" {
            let items: Vec<Predicate> = match value {
                JsonValue::Array(items) => items.iter().filter_map(|item| scoped(prefix, item)).collect(),
                other => scoped(prefix, other).into_iter().collect(),
            };
            if !items.is_empty() {
                out.push(if key == "$or" { Predicate::Or(items) } else { Predicate::And(items) });
            }
            continue;
        }
        let path = join_path(prefix, key);
        match value {
            JsonValue::Object(inner) if is_operator_object(inner) => {
                out.extend(operators_from_json(inner).into_iter().map(|op| Predicate::leaf(path.clone(), op)));
            }
            JsonValue::Object(inner) => flatten_object(&path, inner, out),
            JsonValue::Null => out.push(Predicate::leaf(path, FindOperator::IsNull)),
            JsonValue::Array(values) => out.push(Predicate::leaf(path, FindOperator::In(values.clone()))),
            primitive => out.push(Predicate::leaf(path, FindOperator::Eq(primitive.clone()))),
        }
    }
}

/// An AND group whose paths are relative to `prefix`.
fn scoped(prefix: &str, value: &JsonValue) -> Option<Predicate> {
    let JsonValue::Object(map) = value else {
        return None;
    };
    let mut leaves = Vec::new();
    flatten_object(prefix, map, &mut leaves);
    (!leaves.is_empty()).then_some(Predicate::And(leaves))
}

fn operators_from_json(map: &Map<String, JsonValue>) -> Vec<FindOperator> {
    map.iter().filter_map(|(key, value)| operator_from_json(key, value)).collect()
}

fn operator_from_json(key: &str, value: &JsonValue) -> Option<FindOperator> {
    let op = match key {
        "$eq" => FindOperator::Eq(value.clone()),
        "$gt" => FindOperator::Gt(value.clone()),
        "$gte" => FindOperator::Gte(value.clone()),
        "$lt" => FindOperator::Lt(value.clone()),
        "$lte" => FindOperator::Lte(value.clone()),
        "$btw" => match value.as_array().map(Vec::as_slice) {
            Some([from, to]) => FindOperator::Between(from.clone(), to.clone()),
            _ => return None,
        },
        "$in" => FindOperator::In(value.as_array()?.clone()),
        "$null" => {
            if value.as_bool().unwrap_or(true) {
                FindOperator::IsNull
            } else {
                FindOperator::Not(Box::new(FindOperator::IsNull))
            }
        }
        "$ilike" => FindOperator::ILike(value.as_str()?.to_string()),
        "$not" => {
            let inner = match value {
                JsonValue::Object(inner) if is_operator_object(inner) => {
                    let (key, value) = inner.iter().next()?;
                    operator_from_json(key, value)?
                }
                JsonValue::Null => FindOperator::IsNull,
                other => FindOperator::Eq(other.clone()),
            };
            FindOperator::Not(Box::new(inner))
        }
        _ => {
            tracing::debug!(operator = %key, "ignoring unknown predicate operator");
            return None;
        }
    };
    Some(op)
}

/// Column expression as compared: Postgres enums are compared as text.
fn comparable(target: SimpleExpr, kind: ColumnKind, backend: DatabaseBackend) -> SimpleExpr {
    if backend == DatabaseBackend::Postgres && kind == ColumnKind::Enum {
        Func::cast_as(target, Alias::new("text")).into()
    } else {
        target
    }
}

/// `LOWER(column) LIKE LOWER(pattern)`, casting to text first on Postgres.
pub(crate) fn ilike(target: SimpleExpr, pattern: &str, backend: DatabaseBackend) -> SimpleExpr {
    let target: SimpleExpr = if backend == DatabaseBackend::Postgres {
        Func::cast_as(target, Alias::new("text")).into()
    } else {
        target
    };
    Expr::expr(Func::lower(target)).like(LikeExpr::new(pattern.to_lowercase()).escape('\\'))
}

impl FindOperator {
    /// Compiles the comparison against `target`, binding values as parameters.
    #[must_use]
    pub fn to_expr(&self, target: SimpleExpr, kind: ColumnKind, backend: DatabaseBackend) -> SimpleExpr {
        let value = |v: &JsonValue| -> Value { coerce(v, kind, backend) };
        let column = || Expr::expr(comparable(target.clone(), kind, backend));
        match self {
            Self::Eq(JsonValue::Null) | Self::IsNull => column().is_null(),
            Self::Eq(v) => column().eq(value(v)),
            Self::Gt(v) => column().gt(value(v)),
            Self::Gte(v) => column().gte(value(v)),
            Self::Lt(v) => column().lt(value(v)),
            Self::Lte(v) => column().lte(value(v)),
            Self::Between(from, to) => column().between(value(from), value(to)),
            Self::In(values) => column().is_in(values.iter().map(value)),
            Self::ILike(pattern) => ilike(target.clone(), pattern, backend),
            Self::Not(inner) => inner.to_expr(target.clone(), kind, backend).not(),
        }
    }
}

/// Joins the relation at `path` and returns its key column, for leaves such as
/// `{"owner": {"$null": false}}` that test the relation itself.
fn relation_key(builder: &mut QueryBuilder, path: &str) -> Option<(SimpleExpr, ColumnKind)> {
    let (key, kind) = {
        let relation = builder.metadata().find_relation_path(path.split('.'))?;
        match relation.target.primary_columns().first() {
            Some(column) => (column.name.clone(), column.kind),
            None => (relation.join_on.first()?.1.clone(), ColumnKind::Other),
        }
    };
    let hops: Vec<&str> = path.split('.').collect();
    let alias = builder.left_join(&hops)?;
    Some((Expr::col((Alias::new(alias), Alias::new(key))).into(), kind))
}

/// Translates `predicate` into one condition, left-joining the relations its paths cross.
///
/// A path naming a relation compares the related key column. Other paths that do
/// not resolve are compared as plain root columns, so a mistyped static predicate
/// fails in the database instead of silently matching more rows.
pub fn flatten(builder: &mut QueryBuilder, predicate: &Predicate, backend: DatabaseBackend) -> Condition {
    match predicate {
        Predicate::Leaf { path, op } => {
            let resolved = match resolve(builder, path) {
                Some(column) => Some((column.expr(), column.kind())),
                None => relation_key(builder, path),
            };
            let (target, kind) = match resolved {
                Some(target) => target,
                None => {
                    tracing::warn!(column = %path, "predicate column does not resolve against entity metadata");
                    (
                        Expr::col((Alias::new(builder.alias()), Alias::new(path))).into(),
                        ColumnKind::Other,
                    )
                }
            };
            Condition::all().add(op.to_expr(target, kind, backend))
        }
        Predicate::And(items) => items
            .iter()
            .fold(Condition::all(), |cond, item| cond.add(flatten(builder, item, backend))),
        Predicate::Or(items) => items
            .iter()
            .fold(Condition::any(), |cond, item| cond.add(flatten(builder, item, backend))),
    }
}
