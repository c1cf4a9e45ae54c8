//! # Paginate
//!
//! [`paginate`] turns a [`PaginateQuery`] and a [`PaginateConfig`] into one
//! query against a [`Source`], runs it, and assembles a [`Paginated`] response
//! with meta data and navigation links.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagecrate::{EntityMetadata, PaginateConfig, PaginateError, PaginateQuery, Paginated, paginate_json};
//!
//! async fn list_cats(
//!     State(db): State<DatabaseConnection>,
//!     query: PaginateQuery,
//! ) -> Result<Paginated<serde_json::Value>, PaginateError> {
//!     let config = PaginateConfig::new(["id", "name"])
//!         .with_searchable_columns(["name"])
//!         .with_relations(["owner"]);
//!     paginate_json(&query, Arc::new(EntityMetadata::from_entity::<cat::Entity>()), &config, &db).await
//! }
//! ```
//!
//! Stages run in a fixed order: select, filter, paginate, sort, search. The
//! builder renders everything at the end, so where a stage sits in that order
//! never changes the WHERE clause the others see.

use sea_orm::{ConnectionTrait, DatabaseBackend, FromQueryResult};
use serde_json::{Map, Value as JsonValue};
use url::{Url, form_urlencoded};

use crate::config::PaginateConfig;
use crate::database::builder::{QueryBuilder, Source};
use crate::errors::PaginateError;
use crate::filtering::{
    PageWindow, apply_filters, apply_pagination, apply_search, apply_select, apply_sort, predicate,
    search::search_columns, sort,
};
use crate::models::{PaginateQuery, Paginated, PaginatedLinks, PaginatedMeta, SortDirection};

/// A fully shaped query plus what the response needs to describe it.
struct Prepared {
    builder: QueryBuilder,
    window: PageWindow,
    sort_by: Vec<(String, SortDirection)>,
    search_by: Option<Vec<String>>,
    select: Option<Vec<String>>,
}

fn join_relations(builder: &mut QueryBuilder, config: &PaginateConfig) {
    if !config.relations.is_empty() {
        for relation in &config.relations {
            let path: Vec<&str> = relation.split('.').collect();
            if builder.left_join_and_select(&path).is_none() {
                tracing::warn!(relation = %relation, "configured relation does not exist on entity");
            }
        }
        return;
    }
    if config.load_eager_relations {
        let eager: Vec<String> = builder
            .metadata()
            .relations
            .iter()
            .filter(|r| r.eager)
            .map(|r| r.property.clone())
            .collect();
        for relation in &eager {
            builder.left_join_and_select(&[relation.as_str()]);
        }
    }
}

fn prepare(
    query: &PaginateQuery,
    source: Source,
    config: &PaginateConfig,
    backend: DatabaseBackend,
) -> Result<Prepared, PaginateError> {
    let sort_by = sort::sort_by(&query.sort_by, config)?;
    let window = PageWindow::calculate(query.limit, query.page, config);

    let mut builder = source.into_builder();
    if config.with_deleted {
        builder.with_deleted();
    }
    join_relations(&mut builder, config);
    if let Some(where_clause) = &config.where_clause {
        let condition = predicate::flatten(&mut builder, where_clause, backend);
        builder.and_where(condition);
    }

    let (builder, select) = apply_select(builder, query.select.as_deref(), config);
    let builder = apply_filters(builder, query.filter.as_ref(), config, backend);
    let builder = apply_pagination(builder, &window, config);
    let builder = apply_sort(builder, &sort_by, config, backend);
    let (columns, search_by_narrowed) = search_columns(query.search_by.as_deref(), config);
    let builder = apply_search(builder, query.search.as_deref(), &columns, backend);

    let search_by = (query.search.is_some() && search_by_narrowed).then_some(columns);
    Ok(Prepared {
        builder,
        window,
        sort_by,
        search_by,
        select,
    })
}

/// Runs the query in the mode the window asks for: count only, page and count, or everything.
async fn execute<T, C>(builder: &QueryBuilder, window: &PageWindow, db: &C) -> Result<(Vec<T>, u64), PaginateError>
where
    T: FromQueryResult,
    C: ConnectionTrait,
{
    if window.is_counter_only() {
        let total = builder.get_count(db).await?;
        return Ok((Vec::new(), total));
    }
    if window.is_paginated {
        return Ok(builder.get_many_and_count(db).await?);
    }
    let rows: Vec<T> = builder.get_many(db).await?;
    let total = rows.len() as u64;
    Ok((rows, total))
}

/// Paginates `source` into typed rows.
///
/// Rows are decoded with [`FromQueryResult`]; selected relation columns are
/// named by their dotted path (`owner.name`), so map them with
/// `#[sea_orm(from_col = "owner.name")]` or use [`paginate_json`].
///
/// # Errors
///
/// [`PaginateError::Misconfigured`] when the config has no sortable columns,
/// [`PaginateError::Database`] when a query fails.
pub async fn paginate<T, C>(
    query: &PaginateQuery,
    source: impl Into<Source>,
    config: &PaginateConfig,
    db: &C,
) -> Result<Paginated<T>, PaginateError>
where
    T: FromQueryResult,
    C: ConnectionTrait,
{
    let prepared = prepare(query, source.into(), config, db.get_database_backend())?;
    let (rows, total) = execute::<T, C>(&prepared.builder, &prepared.window, db).await?;
    Ok(assemble(rows, total, prepared, query, config))
}

/// Paginates `source` into JSON objects, nesting dotted keys (`owner.name`) into objects.
///
/// A nested object whose values are all null (an unmatched left join) becomes `null`.
///
/// # Errors
///
/// Same as [`paginate`].
pub async fn paginate_json<C>(
    query: &PaginateQuery,
    source: impl Into<Source>,
    config: &PaginateConfig,
    db: &C,
) -> Result<Paginated<JsonValue>, PaginateError>
where
    C: ConnectionTrait,
{
    let mut page: Paginated<JsonValue> = paginate(query, source, config, db).await?;
    page.data = page.data.into_iter().map(nest_row).collect();
    Ok(page)
}

fn nest_row(row: JsonValue) -> JsonValue {
    let JsonValue::Object(flat) = row else {
        return row;
    };
    let mut nested = Map::new();
    for (key, value) in flat {
        let segments: Vec<&str> = key.split('.').collect();
        insert_path(&mut nested, &segments, value);
    }
    collapse_null_objects(&mut nested);
    JsonValue::Object(nested)
}

fn insert_path(map: &mut Map<String, JsonValue>, segments: &[&str], value: JsonValue) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if let JsonValue::Object(inner) = entry {
                insert_path(inner, rest, value);
            } else {
                let mut inner = Map::new();
                insert_path(&mut inner, rest, value);
                *entry = JsonValue::Object(inner);
            }
        }
    }
}

/// Replaces nested objects whose leaves are all null with `null`.
fn collapse_null_objects(map: &mut Map<String, JsonValue>) {
    for value in map.values_mut() {
        if let JsonValue::Object(inner) = value {
            collapse_null_objects(inner);
            if inner.values().all(JsonValue::is_null) {
                *value = JsonValue::Null;
            }
        }
    }
}

fn assemble<T>(
    rows: Vec<T>,
    total: u64,
    prepared: Prepared,
    query: &PaginateQuery,
    config: &PaginateConfig,
) -> Paginated<T> {
    let Prepared {
        window,
        sort_by,
        search_by,
        select,
        ..
    } = prepared;
    let total_pages = window.total_pages(total);
    let items_per_page = if window.is_counter_only() {
        total
    } else if window.is_paginated {
        u64::try_from(window.limit).unwrap_or_default()
    } else {
        rows.len() as u64
    };
    let meta = PaginatedMeta {
        items_per_page,
        total_items: total,
        current_page: window.page,
        total_pages,
        sort_by,
        search_by,
        search: query.search.clone(),
        select,
        filter: query.filter.clone(),
    };
    let links = query
        .path
        .as_deref()
        .map(|path| build_links(path, query, &meta, &window, config))
        .unwrap_or_default();
    Paginated {
        data: rows,
        meta,
        links,
    }
}

/// Base of every link: the full URL, the path only, or the path on `origin`.
fn link_base(path: &str, config: &PaginateConfig) -> String {
    let Ok(url) = Url::parse(path) else {
        return path.to_string();
    };
    if config.relative_path {
        return url.path().to_string();
    }
    match &config.origin {
        Some(origin) => format!("{}{}", origin.trim_end_matches('/'), url.path()),
        None => format!("{}{}", url.origin().ascii_serialization(), url.path()),
    }
}

/// Query-string options shared by every link: everything but the page.
fn link_options(meta: &PaginatedMeta, window: &PageWindow, query: &PaginateQuery) -> Vec<(String, String)> {
    let mut options = vec![("limit".to_string(), window.limit.to_string())];
    for (column, direction) in &meta.sort_by {
        options.push(("sortBy".to_string(), format!("{column}:{}", direction.as_str())));
    }
    if let Some(search) = &meta.search {
        options.push(("search".to_string(), search.clone()));
    }
    if let Some(search_by) = &meta.search_by {
        for column in search_by {
            options.push(("searchBy".to_string(), column.clone()));
        }
    }
    if let Some(select) = &meta.select {
        options.push(("select".to_string(), select.join(",")));
    }
    if let Some(filter) = &query.filter {
        for (column, value) in filter {
            for token in value.tokens() {
                options.push((format!("filter.{column}"), token.to_string()));
            }
        }
    }
    options
}

fn build_links(
    path: &str,
    query: &PaginateQuery,
    meta: &PaginatedMeta,
    window: &PageWindow,
    config: &PaginateConfig,
) -> PaginatedLinks {
    let base = link_base(path, config);
    let options = link_options(meta, window, query);
    let link = |page: u64| {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("page", &page.to_string());
        for (key, value) in &options {
            serializer.append_pair(key, value);
        }
        format!("{base}?{}", serializer.finish())
    };
    let page = window.page;
    let total_pages = meta.total_pages;
    PaginatedLinks {
        first: (page != 1).then(|| link(1)),
        previous: (page > 1).then(|| link(page - 1)),
        current: Some(link(page)),
        next: (page < total_pages).then(|| link(page + 1)),
        last: (page != total_pages && meta.total_items > 0).then(|| link(total_pages)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(total_items: u64, total_pages: u64) -> PaginatedMeta {
        PaginatedMeta {
            items_per_page: 10,
            total_items,
            current_page: 1,
            total_pages,
            sort_by: vec![("id".to_string(), SortDirection::Asc)],
            search_by: None,
            search: None,
            select: None,
            filter: None,
        }
    }

    fn window(page: u64) -> PageWindow {
        PageWindow {
            is_paginated: true,
            limit: 10,
            page,
            offset: (page - 1) * 10,
        }
    }

    fn links(page: u64, total_items: u64, total_pages: u64, config: &PaginateConfig) -> PaginatedLinks {
        let query = PaginateQuery::new().with_path("http://localhost:3000/cats");
        build_links("http://localhost:3000/cats", &query, &meta(total_items, total_pages), &window(page), config)
    }

    #[test]
    fn test_first_page_links() {
        let links = links(1, 50, 5, &PaginateConfig::new(["id"]));
        assert!(links.first.is_none());
        assert!(links.previous.is_none());
        assert_eq!(
            links.current.as_deref(),
            Some("http://localhost:3000/cats?page=1&limit=10&sortBy=id%3AASC")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("http://localhost:3000/cats?page=2&limit=10&sortBy=id%3AASC")
        );
        assert!(links.last.as_deref().is_some_and(|l| l.contains("page=5")));
    }

    #[test]
    fn test_last_page_links() {
        let links = links(5, 50, 5, &PaginateConfig::new(["id"]));
        assert!(links.first.as_deref().is_some_and(|l| l.contains("page=1")));
        assert!(links.previous.as_deref().is_some_and(|l| l.contains("page=4")));
        assert!(links.next.is_none());
        assert!(links.last.is_none());
    }

    #[test]
    fn test_empty_result_has_no_last_link() {
        let links = links(1, 0, 0, &PaginateConfig::new(["id"]));
        assert!(links.last.is_none());
        assert!(links.next.is_none());
        assert!(links.current.is_some());
    }

    #[test]
    fn test_relative_and_origin_links() {
        let relative = links(1, 50, 5, &PaginateConfig::new(["id"]).with_relative_path(true));
        assert!(relative.current.as_deref().is_some_and(|l| l.starts_with("/cats?page=1")));

        let origin = links(1, 50, 5, &PaginateConfig::new(["id"]).with_origin("https://api.example.com/"));
        assert!(origin.current.as_deref().is_some_and(|l| l.starts_with("https://api.example.com/cats?page=1")));
    }

    #[test]
    fn test_link_options_encode_query_state() {
        let query = PaginateQuery::new()
            .with_filter("age", "$btw:3,5")
            .with_filter("status", vec!["a", "b"]);
        let mut meta = meta(50, 5);
        meta.search = Some("milo cat".to_string());
        meta.search_by = Some(vec!["name".to_string()]);
        meta.select = Some(vec!["id".to_string(), "name".to_string()]);
        let options = link_options(&meta, &window(1), &query);
        assert_eq!(
            options,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("sortBy".to_string(), "id:ASC".to_string()),
                ("search".to_string(), "milo cat".to_string()),
                ("searchBy".to_string(), "name".to_string()),
                ("select".to_string(), "id,name".to_string()),
                ("filter.age".to_string(), "$btw:3,5".to_string()),
                ("filter.status".to_string(), "a".to_string()),
                ("filter.status".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_nest_row() {
        let row = json!({ "id": 1, "owner.name": "Ann", "owner.home.street": "Main" });
        assert_eq!(
            nest_row(row),
            json!({ "id": 1, "owner": { "name": "Ann", "home": { "street": "Main" } } })
        );
    }

    #[test]
    fn test_nest_row_collapses_unmatched_joins() {
        let row = json!({ "id": 1, "owner.id": null, "owner.name": null });
        assert_eq!(nest_row(row), json!({ "id": 1, "owner": null }));
    }
}
