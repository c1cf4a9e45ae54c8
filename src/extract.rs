//! Reading a [`PaginateQuery`] from an HTTP request.
//!
//! ```text
//! GET /cats?page=2&limit=10&sortBy=name:DESC&search=mi&searchBy=name&select=id,name&filter.age=$gte:3
//! ```
//!
//! Malformed numbers are ignored rather than rejected, in line with how the rest of
//! the request is validated.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts},
};
use url::form_urlencoded;
use utoipa::IntoParams;

use crate::models::{FilterValue, PaginateQuery};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl PaginateQuery {
    /// Parses a raw query string (without the leading `?`).
    ///
    /// `path` is the request URL without its query string, or `None` when links
    /// should not be generated.
    #[must_use]
    pub fn from_query_string(path: Option<String>, query_string: &str) -> Self {
        let mut query = Self {
            path,
            ..Self::default()
        };
        for (key, value) in form_urlencoded::parse(query_string.as_bytes()) {
            match key.as_ref() {
                "page" => query.page = value.trim().parse().ok().or(query.page),
                "limit" => query.limit = value.trim().parse().ok().or(query.limit),
                "sortBy" => {
                    if let Some((column, direction)) = value.rsplit_once(':') {
                        query.sort_by.push((column.to_string(), direction.to_string()));
                    }
                }
                "search" => query.search = Some(value.into_owned()),
                "searchBy" => query.search_by.get_or_insert_with(Vec::new).extend(split_list(&value)),
                "select" => query.select.get_or_insert_with(Vec::new).extend(split_list(&value)),
                other => {
                    let Some(column) = other.strip_prefix("filter.").filter(|c| !c.is_empty()) else {
                        continue;
                    };
                    let filter = query.filter.get_or_insert_with(Default::default);
                    match filter.get_mut(column) {
                        Some(existing) => existing.push(value.into_owned()),
                        None => {
                            filter.insert(column.to_string(), FilterValue::One(value.into_owned()));
                        }
                    }
                }
            }
        }
        query
    }
}

/// `<scheme>://<host><path>` of the request, `None` without a `Host`.
///
/// Uses the URI before any `Router::nest` prefix was stripped.
fn request_path(parts: &Parts) -> Option<String> {
    let uri = parts.extensions.get::<OriginalUri>().map_or(&parts.uri, |original| &original.0);
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(ToString::to_string))?;
    let scheme = parts
        .headers
        .get(FORWARDED_PROTO)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());
    Some(format!("{scheme}://{host}{}", uri.path()))
}

impl<S> FromRequestParts<S> for PaginateQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query_string = parts.uri.query().unwrap_or_default();
        Ok(Self::from_query_string(request_path(parts), query_string))
    }
}

/// OpenAPI description of the query parameters [`PaginateQuery`] reads.
///
/// Filters are sent as `filter.<column>=<token>` and are not listed individually.
#[derive(IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginateParams {
    /// Page number (1-based).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Page size. `0` returns only the total count; `-1` returns every row when the resource allows it.
    #[param(example = 20)]
    pub limit: Option<i64>,
    /// Ordering as `column:ASC` or `column:DESC`; repeat for several columns.
    #[param(rename = "sortBy", example = "name:ASC")]
    pub sort_by: Option<Vec<String>>,
    /// Case-insensitive substring searched in the searchable columns.
    #[param(example = "milo")]
    pub search: Option<String>,
    /// Comma-separated subset of the searchable columns.
    #[param(rename = "searchBy", example = "name,owner.name")]
    pub search_by: Option<String>,
    /// Comma-separated subset of the selectable columns.
    #[param(example = "id,name")]
    pub select: Option<String>,
}
