use std::collections::BTreeMap;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use sea_orm::Order;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-insensitive parse; anything but `ASC`/`DESC` is rejected.
    #[must_use]
    pub fn parse(direction: &str) -> Option<Self> {
        match direction.to_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Self::Asc,
            SortDirection::Desc => Self::Desc,
        }
    }
}

/// One filter token or several for the same column (OR-ed together).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Self::One(token) => vec![token.as_str()],
            Self::Many(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }

    /// Appends another token, turning a single value into a list.
    pub fn push(&mut self, token: String) {
        match self {
            Self::One(existing) => *self = Self::Many(vec![std::mem::take(existing), token]),
            Self::Many(tokens) => tokens.push(token),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(token: &str) -> Self {
        Self::One(token.to_string())
    }
}

impl<S: Into<String>> From<Vec<S>> for FilterValue {
    fn from(tokens: Vec<S>) -> Self {
        Self::Many(tokens.into_iter().map(Into::into).collect())
    }
}

/// Pagination request as sent by a client.
///
/// Usually extracted from the request with the [`FromRequestParts`](axum::extract::FromRequestParts)
/// implementation in [`extract`](crate::extract), or parsed with
/// [`PaginateQuery::from_query_string`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginateQuery {
    pub page: Option<u64>,
    /// Requested page size; `0` asks for a count only, `-1` for every row.
    pub limit: Option<i64>,
    /// Raw `(column, direction)` pairs, validated later against the config.
    pub sort_by: Vec<(String, String)>,
    pub search: Option<String>,
    pub search_by: Option<Vec<String>>,
    pub filter: Option<BTreeMap<String, FilterValue>>,
    pub select: Option<Vec<String>>,
    /// Absolute URL of the request without its query string, `None` when not addressable.
    pub path: Option<String>,
}

impl PaginateQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_sort_by(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort_by.push((column.into(), direction.into()));
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub fn with_search_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_by = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filter.get_or_insert_with(BTreeMap::new).insert(column.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedMeta {
    pub items_per_page: u64,
    pub total_items: u64,
    pub current_page: u64,
    pub total_pages: u64,
    /// Effective ordering as `[column, direction]` pairs.
    #[schema(value_type = Vec<Vec<String>>)]
    pub sort_by: Vec<(String, SortDirection)>,
    pub search_by: Option<Vec<String>>,
    pub search: Option<String>,
    pub select: Option<Vec<String>>,
    /// The request's filter map, echoed verbatim.
    #[schema(value_type = Option<Object>)]
    pub filter: Option<BTreeMap<String, FilterValue>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginatedLinks {
    pub first: Option<String>,
    pub previous: Option<String>,
    pub current: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginatedMeta,
    pub links: PaginatedLinks,
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("asc"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::parse("DeSc"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse("up"), None);
        assert_eq!(SortDirection::parse(""), None);
    }

    #[test]
    fn test_filter_value_push() {
        let mut value = FilterValue::from("$eq:a");
        value.push("$eq:b".to_string());
        assert_eq!(value, FilterValue::Many(vec!["$eq:a".into(), "$eq:b".into()]));
        assert_eq!(value.tokens(), vec!["$eq:a", "$eq:b"]);
    }

    #[test]
    fn test_meta_serializes_camel_case_without_nones() {
        let meta = PaginatedMeta {
            items_per_page: 10,
            total_items: 25,
            current_page: 2,
            total_pages: 3,
            sort_by: vec![("id".to_string(), SortDirection::Asc)],
            search_by: None,
            search: None,
            select: None,
            filter: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "itemsPerPage": 10,
                "totalItems": 25,
                "currentPage": 2,
                "totalPages": 3,
                "sortBy": [["id", "ASC"]]
            })
        );
    }

    #[test]
    fn test_filter_value_serializes_untagged() {
        let query = PaginateQuery::new().with_filter("age", "$gte:3").with_filter("color", vec!["red", "blue"]);
        let json = serde_json::to_value(query.filter.unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "age": "$gte:3", "color": ["red", "blue"] }));
    }
}
