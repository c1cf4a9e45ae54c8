use sea_orm::{DatabaseBackend, Value};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::database::metadata::ColumnKind;

/// Escapes LIKE wildcards so user input only ever matches literally.
/// Escapes: `\` first, then `%` (match any) and `_` (match single char).
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Converts a JSON or query-string value into a bound parameter of the column's type.
///
/// Strings that do not parse as the column kind are bound as text and left to the database.
#[must_use]
pub fn coerce(raw: &JsonValue, kind: ColumnKind, backend: DatabaseBackend) -> Value {
    match raw {
        JsonValue::Bool(b) => Value::from(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) if kind != ColumnKind::Float => Value::from(i),
            _ => Value::from(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => coerce_str(s, kind, backend),
        other => Value::from(other.to_string()),
    }
}

fn coerce_str(raw: &str, kind: ColumnKind, backend: DatabaseBackend) -> Value {
    let trimmed = raw.trim();
    let parsed = match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| trimmed.parse::<f64>().ok().map(Value::from)),
        ColumnKind::Float => trimmed.parse::<f64>().ok().map(Value::from),
        ColumnKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::from(true)),
            "false" | "0" => Some(Value::from(false)),
            _ => None,
        },
        ColumnKind::Uuid => Uuid::parse_str(trimmed).ok().map(Value::from),
        // SQLite stores timestamps as text, so comparing strings keeps the stored format.
        ColumnKind::DateTime if backend != DatabaseBackend::Sqlite => {
            chrono::DateTime::parse_from_rfc3339(trimmed).ok().map(Value::from)
        }
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::from(raw.to_string()))
}
