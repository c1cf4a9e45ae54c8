//! Query accumulator rendered to a Sea-Query `SELECT`.
//!
//! [`QueryBuilder`] collects joins, selections, predicates, ordering and the
//! page window for one root entity, then renders either the row query or a
//! distinct-root count query and executes it through any Sea-ORM
//! [`ConnectionTrait`].

use std::sync::Arc;

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DbErr, FromQueryResult, Order, Statement,
    sea_query::{
        Alias, Condition, Expr, Func, IntoCondition, JoinType, NullOrdering, Query, SelectStatement,
        SimpleExpr,
    },
};

use super::metadata::{ColumnMetadata, EntityMetadata, RelationMetadata};

/// Alias given to the root entity when a builder is created from metadata.
pub const ROOT_ALIAS: &str = "__root";

/// Column alias of the count query result.
const COUNT_ALIAS: &str = "num_items";

/// Alias of the distinct root-key subquery used when joins can repeat root rows.
const PAGE_ALIAS: &str = "__page";

fn key_alias(index: usize) -> String {
    format!("__key_{index}")
}

fn order_alias(index: usize) -> String {
    format!("__order_{index}")
}

/// Join alias for a relation path, e.g. `__root_owner_rel_home_rel` for `owner.home`.
#[must_use]
pub fn relation_alias(root_alias: &str, path: &[&str]) -> String {
    let mut alias = root_alias.to_string();
    for segment in path {
        alias.push('_');
        alias.push_str(segment);
        alias.push_str("_rel");
    }
    alias
}

#[derive(Debug, Clone)]
struct Join {
    /// Dotted relation path from the root, e.g. `owner.home`.
    path: String,
    alias: String,
    parent_alias: String,
    relation: RelationMetadata,
    select: bool,
}

#[derive(Debug, Clone)]
struct OrderBy {
    expr: SimpleExpr,
    order: Order,
    nulls: Option<NullOrdering>,
}

/// Where the rows come from: a bare entity or a builder the caller already scoped.
#[derive(Debug, Clone)]
pub enum Source {
    Entity(Arc<EntityMetadata>),
    Builder(QueryBuilder),
}

impl Source {
    #[must_use]
    pub fn into_builder(self) -> QueryBuilder {
        match self {
            Self::Entity(metadata) => QueryBuilder::new(metadata, ROOT_ALIAS),
            Self::Builder(builder) => builder,
        }
    }
}

impl From<Arc<EntityMetadata>> for Source {
    fn from(metadata: Arc<EntityMetadata>) -> Self {
        Self::Entity(metadata)
    }
}

impl From<QueryBuilder> for Source {
    fn from(builder: QueryBuilder) -> Self {
        Self::Builder(builder)
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    alias: String,
    metadata: Arc<EntityMetadata>,
    /// `None` selects every stored column of the root and of joined-and-selected relations.
    selects: Option<Vec<(SimpleExpr, String)>>,
    extra_selects: Vec<(SimpleExpr, String)>,
    joins: Vec<Join>,
    condition: Option<Condition>,
    orders: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    take: Option<u64>,
    skip: Option<u64>,
    with_deleted: bool,
}

impl QueryBuilder {
    pub fn new(metadata: Arc<EntityMetadata>, alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            metadata,
            selects: None,
            extra_selects: Vec::new(),
            joins: Vec::new(),
            condition: None,
            orders: Vec::new(),
            limit: None,
            offset: None,
            take: None,
            skip: None,
            with_deleted: false,
        }
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// Replaces the default selection with explicit `(expression, output name)` pairs.
    pub fn select(&mut self, columns: Vec<(SimpleExpr, String)>) -> &mut Self {
        self.selects = Some(columns);
        self
    }

    /// Adds an expression to whatever else is selected.
    pub fn add_select(&mut self, expr: SimpleExpr, alias: impl Into<String>) -> &mut Self {
        self.extra_selects.push((expr, alias.into()));
        self
    }

    #[must_use]
    pub fn has_explicit_select(&self) -> bool {
        self.selects.is_some()
    }

    #[must_use]
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    /// Left-joins every missing hop of a relation path and returns the alias of the last hop.
    ///
    /// Returns `None` when a segment is not a relation of the entity it hangs off.
    pub fn left_join(&mut self, path: &[&str]) -> Option<String> {
        self.join_path(path, false)
    }

    /// Like [`left_join`](Self::left_join) but also selects the columns of every hop.
    pub fn left_join_and_select(&mut self, path: &[&str]) -> Option<String> {
        self.join_path(path, true)
    }

    fn join_path(&mut self, path: &[&str], select: bool) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        let mut entity = Arc::clone(&self.metadata);
        let mut parent_alias = self.alias.clone();
        for depth in 1..=path.len() {
            let segment = path[depth - 1];
            let relation = entity.find_relation(segment)?.clone();
            let alias = relation_alias(&self.alias, &path[..depth]);
            if let Some(existing) = self.joins.iter_mut().find(|j| j.alias == alias) {
                existing.select |= select;
            } else {
                tracing::trace!(alias = %alias, "adding left join");
                self.joins.push(Join {
                    path: path[..depth].join("."),
                    alias: alias.clone(),
                    parent_alias: parent_alias.clone(),
                    relation: relation.clone(),
                    select,
                });
            }
            entity = Arc::clone(&relation.target);
            parent_alias = alias;
        }
        Some(parent_alias)
    }

    /// AND-s `condition` with the existing predicate.
    pub fn and_where(&mut self, condition: impl IntoCondition) -> &mut Self {
        let condition = condition.into_condition();
        self.condition = Some(match self.condition.take() {
            None => condition,
            Some(existing) => Condition::all().add(existing).add(condition),
        });
        self
    }

    /// OR-s `condition` with the existing predicate.
    pub fn or_where(&mut self, condition: impl IntoCondition) -> &mut Self {
        let condition = condition.into_condition();
        self.condition = Some(match self.condition.take() {
            None => condition,
            Some(existing) => Condition::any().add(existing).add(condition),
        });
        self
    }

    pub fn add_order_by(&mut self, expr: SimpleExpr, order: Order, nulls: Option<NullOrdering>) -> &mut Self {
        self.orders.push(OrderBy { expr, order, nulls });
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn take(&mut self, take: u64) -> &mut Self {
        self.take = Some(take);
        self
    }

    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_deleted(&mut self) -> &mut Self {
        self.with_deleted = true;
        self
    }

    fn column_expr(table_alias: &str, column: &ColumnMetadata) -> SimpleExpr {
        match &column.expression {
            Some(expression) => Expr::cust(format!("({})", expression(table_alias))),
            None => Expr::col((Alias::new(table_alias), Alias::new(&column.name))).into(),
        }
    }

    fn default_selection(&self) -> Vec<(SimpleExpr, String)> {
        let mut columns: Vec<(SimpleExpr, String)> = self
            .metadata
            .selectable_columns()
            .into_iter()
            .map(|(path, column)| (Self::column_expr(&self.alias, column), path))
            .collect();
        for join in self.joins.iter().filter(|j| j.select) {
            for (path, column) in join.relation.target.selectable_columns() {
                columns.push((
                    Self::column_expr(&join.alias, column),
                    format!("{}.{path}", join.path),
                ));
            }
        }
        columns
    }

    fn push_join(stmt: &mut SelectStatement, join: &Join) {
        let on = join
            .relation
            .join_on
            .iter()
            .fold(Condition::all(), |cond, (local, foreign)| {
                cond.add(
                    Expr::col((Alias::new(&join.parent_alias), Alias::new(local)))
                        .equals((Alias::new(&join.alias), Alias::new(foreign))),
                )
            });
        stmt.join_as(
            JoinType::LeftJoin,
            Alias::new(&join.relation.target.table),
            Alias::new(&join.alias),
            on,
        );
    }

    fn push_order(stmt: &mut SelectStatement, expr: SimpleExpr, order: &OrderBy) {
        match order.nulls.clone() {
            Some(nulls) => stmt.order_by_expr_with_nulls(expr, order.order.clone(), nulls),
            None => stmt.order_by_expr(expr, order.order.clone()),
        };
    }

    fn push_window(&self, stmt: &mut SelectStatement) {
        if let Some(limit) = self.take.or(self.limit) {
            stmt.limit(limit);
        }
        if let Some(offset) = self.skip.or(self.offset) {
            stmt.offset(offset);
        }
    }

    fn selection(&self) -> Vec<(SimpleExpr, String)> {
        let mut selection = self.selects.clone().unwrap_or_else(|| self.default_selection());
        selection.extend(self.extra_selects.iter().cloned());
        selection
    }

    /// FROM, joins and WHERE shared by the row and count queries.
    fn base_statement(&self) -> SelectStatement {
        let mut stmt = Query::select();
        stmt.from_as(Alias::new(&self.metadata.table), Alias::new(&self.alias));
        for join in &self.joins {
            Self::push_join(&mut stmt, join);
        }
        let mut condition = self.condition.clone();
        if !self.with_deleted
            && let Some(column) = &self.metadata.delete_date_column
        {
            let not_deleted = Expr::col((Alias::new(&self.alias), Alias::new(column))).is_null();
            condition = Some(match condition {
                None => not_deleted.into_condition(),
                Some(existing) => Condition::all().add(existing).add(not_deleted),
            });
        }
        if let Some(condition) = condition {
            stmt.cond_where(condition);
        }
        stmt
    }

    /// Row query: selection, ordering and the page window.
    ///
    /// When a joined relation can repeat root rows, the window is cut over distinct
    /// root primary keys instead, see [`build_keyed_select`](Self::build_keyed_select).
    #[must_use]
    pub fn build_select(&self) -> SelectStatement {
        let primary = self.metadata.primary_columns();
        if primary.is_empty() || !self.joins.iter().any(|j| j.relation.is_to_many()) {
            return self.build_flat_select();
        }
        self.build_keyed_select(&primary)
    }

    fn build_flat_select(&self) -> SelectStatement {
        let mut stmt = self.base_statement();
        for (expr, name) in self.selection() {
            stmt.expr_as(expr, Alias::new(name));
        }
        for order in &self.orders {
            Self::push_order(&mut stmt, order.expr.clone(), order);
        }
        self.push_window(&mut stmt);
        stmt
    }

    /// Two-step row query for to-many joins.
    ///
    /// `__page` groups the filtered rows by root key, orders the groups by `MIN`
    /// (ascending) or `MAX` (descending) of each order expression and applies the
    /// window. The outer query joins those keys back to the root table and adds
    /// only the relations that are selected, so every root appears once per
    /// selected related row and the page holds exactly the counted roots.
    fn build_keyed_select(&self, primary: &[&ColumnMetadata]) -> SelectStatement {
        let page = Alias::new(PAGE_ALIAS);
        let mut keys = self.base_statement();
        for (index, column) in primary.iter().enumerate() {
            let key = Expr::col((Alias::new(&self.alias), Alias::new(&column.name)));
            keys.expr_as(key.clone(), Alias::new(key_alias(index)));
            keys.add_group_by([SimpleExpr::from(key)]);
        }
        for (index, order) in self.orders.iter().enumerate() {
            let aggregate = match order.order {
                Order::Desc => Func::max(order.expr.clone()),
                _ => Func::min(order.expr.clone()),
            };
            keys.expr_as(aggregate, Alias::new(order_alias(index)));
            Self::push_order(&mut keys, Expr::col(Alias::new(order_alias(index))).into(), order);
        }
        for index in 0..primary.len() {
            keys.order_by_expr(Expr::col(Alias::new(key_alias(index))).into(), Order::Asc);
        }
        self.push_window(&mut keys);

        let mut stmt = Query::select();
        stmt.from_as(Alias::new(&self.metadata.table), Alias::new(&self.alias));
        let on = primary
            .iter()
            .enumerate()
            .fold(Condition::all(), |cond, (index, column)| {
                cond.add(
                    Expr::col((Alias::new(&self.alias), Alias::new(&column.name)))
                        .equals((page.clone(), Alias::new(key_alias(index)))),
                )
            });
        stmt.join_subquery(JoinType::InnerJoin, keys, page.clone(), on);
        for join in self.joins.iter().filter(|j| j.select) {
            Self::push_join(&mut stmt, join);
        }
        for (expr, name) in self.selection() {
            stmt.expr_as(expr, Alias::new(name));
        }
        for (index, order) in self.orders.iter().enumerate() {
            Self::push_order(&mut stmt, Expr::col((page.clone(), Alias::new(order_alias(index)))).into(), order);
        }
        for index in 0..primary.len() {
            stmt.order_by_expr(Expr::col((page.clone(), Alias::new(key_alias(index)))).into(), Order::Asc);
        }
        stmt
    }

    /// `COUNT(*)` over distinct root primary keys so joined rows are not counted twice.
    #[must_use]
    pub fn build_count(&self) -> SelectStatement {
        let mut inner = self.base_statement();
        let primary = self.metadata.primary_columns();
        if primary.is_empty() {
            inner.expr(Expr::val(1));
        } else {
            inner.distinct();
            for column in primary {
                inner.expr_as(
                    Expr::col((Alias::new(&self.alias), Alias::new(&column.name))),
                    Alias::new(&column.property),
                );
            }
        }
        Query::select()
            .expr_as(Expr::cust("COUNT(*)"), Alias::new(COUNT_ALIAS))
            .from_subquery(inner, Alias::new("sub_query"))
            .to_owned()
    }

    /// Renders the row query for `backend`.
    #[must_use]
    pub fn to_statement(&self, backend: DatabaseBackend) -> Statement {
        backend.build(&self.build_select())
    }

    pub async fn get_many<T, C>(&self, db: &C) -> Result<Vec<T>, DbErr>
    where
        T: FromQueryResult,
        C: ConnectionTrait,
    {
        let backend = db.get_database_backend();
        T::find_by_statement(self.to_statement(backend)).all(db).await
    }

    pub async fn get_count<C>(&self, db: &C) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let backend = db.get_database_backend();
        let statement = backend.build(&self.build_count());
        let Some(row) = db.query_one(statement).await? else {
            return Ok(0);
        };
        let count: i64 = row.try_get("", COUNT_ALIAS)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub async fn get_many_and_count<T, C>(&self, db: &C) -> Result<(Vec<T>, u64), DbErr>
    where
        T: FromQueryResult,
        C: ConnectionTrait,
    {
        let rows = self.get_many(db).await?;
        let count = self.get_count(db).await?;
        Ok((rows, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::metadata::{ColumnKind, ColumnMetadata, RelationMetadata};

    fn metadata() -> Arc<EntityMetadata> {
        let home = Arc::new(
            EntityMetadata::new("homes")
                .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
                .column(ColumnMetadata::new("street", ColumnKind::Text)),
        );
        let owner = Arc::new(
            EntityMetadata::new("owners")
                .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
                .column(ColumnMetadata::new("name", ColumnKind::Text))
                .relation(RelationMetadata::new("home", home).on("home_id", "id")),
        );
        Arc::new(
            EntityMetadata::new("cats")
                .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
                .column(ColumnMetadata::new("name", ColumnKind::Text))
                .relation(RelationMetadata::new("owner", owner).on("owner_id", "id"))
                .soft_delete("deleted_at"),
        )
    }

    fn sql(builder: &QueryBuilder) -> String {
        builder.to_statement(DatabaseBackend::Sqlite).sql
    }

    #[test]
    fn test_relation_alias_is_path_derived() {
        assert_eq!(relation_alias("__root", &["owner"]), "__root_owner_rel");
        assert_eq!(relation_alias("__root", &["owner", "home"]), "__root_owner_rel_home_rel");
    }

    #[test]
    fn test_join_path_adds_each_hop_once() {
        let mut qb = Source::Entity(metadata()).into_builder();
        assert_eq!(qb.left_join(&["owner", "home"]).as_deref(), Some("__root_owner_rel_home_rel"));
        assert_eq!(qb.left_join(&["owner"]).as_deref(), Some("__root_owner_rel"));
        assert!(qb.has_join("__root_owner_rel"));
        assert!(qb.has_join("__root_owner_rel_home_rel"));
        assert_eq!(qb.joins.len(), 2);
        assert!(qb.left_join(&["toys"]).is_none());
    }

    #[test]
    fn test_default_selection_includes_joined_and_selected() {
        let mut qb = Source::Entity(metadata()).into_builder();
        qb.left_join_and_select(&["owner"]);
        let sql = sql(&qb);
        assert!(sql.contains(r#""__root"."name" AS "name""#), "{sql}");
        assert!(sql.contains(r#""__root_owner_rel"."name" AS "owner.name""#), "{sql}");
        assert!(sql.contains(r#"LEFT JOIN "owners" AS "__root_owner_rel""#), "{sql}");
        assert!(sql.contains(r#""__root"."owner_id" = "__root_owner_rel"."id""#), "{sql}");
    }

    #[test]
    fn test_soft_delete_filter_and_with_deleted() {
        let mut qb = Source::Entity(metadata()).into_builder();
        assert!(sql(&qb).contains(r#""__root"."deleted_at" IS NULL"#));
        qb.with_deleted();
        assert!(!sql(&qb).contains("deleted_at"));
    }

    #[test]
    fn test_take_and_skip_render_like_limit_and_offset() {
        let mut a = Source::Entity(metadata()).into_builder();
        a.limit(10).offset(20);
        let mut b = Source::Entity(metadata()).into_builder();
        b.take(10).skip(20);
        assert_eq!(sql(&a), sql(&b));
        assert!(sql(&a).contains("LIMIT"));
    }

    #[test]
    fn test_or_where_wraps_existing_condition() {
        let mut qb = Source::Entity(metadata()).into_builder();
        qb.with_deleted();
        qb.and_where(Expr::col((Alias::new("__root"), Alias::new("id"))).eq(1));
        qb.or_where(Expr::col((Alias::new("__root"), Alias::new("id"))).eq(2));
        let statement = qb.to_statement(DatabaseBackend::Sqlite);
        assert!(statement.sql.contains(" OR "), "{}", statement.sql);
        assert_eq!(statement.values.map(|v| v.0.len()), Some(2));
    }

    fn owners_with_cats() -> Arc<EntityMetadata> {
        let cats = Arc::new(
            EntityMetadata::new("cats")
                .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
                .column(ColumnMetadata::new("color", ColumnKind::Text)),
        );
        Arc::new(
            EntityMetadata::new("owners")
                .column(ColumnMetadata::new("id", ColumnKind::Integer).primary())
                .column(ColumnMetadata::new("name", ColumnKind::Text))
                .relation(RelationMetadata::new("cats", cats).on("id", "owner_id")),
        )
    }

    #[test]
    fn test_to_one_joins_keep_a_flat_window() {
        let mut qb = Source::Entity(metadata()).into_builder();
        qb.left_join(&["owner"]);
        qb.limit(2);
        let sql = sql(&qb);
        assert!(!sql.contains("GROUP BY"), "{sql}");
        assert!(!sql.contains("__page"), "{sql}");
    }

    #[test]
    fn test_to_many_join_windows_distinct_root_keys() {
        let mut qb = Source::Entity(owners_with_cats()).into_builder();
        let alias = qb.left_join(&["cats"]).unwrap_or_default();
        qb.and_where(Expr::col((Alias::new(alias.as_str()), Alias::new("color"))).eq("black"));
        qb.add_order_by(Expr::col((Alias::new(alias.as_str()), Alias::new("color"))).into(), Order::Desc, None);
        qb.limit(2).offset(4);
        let sql = sql(&qb);

        let (outer, keys) = sql.split_once("INNER JOIN (").unwrap_or_default();
        assert!(outer.starts_with("SELECT"), "{sql}");
        assert!(keys.contains(r#""__root"."id" AS "__key_0""#), "{sql}");
        assert!(keys.contains(r#"MAX("__root_cats_rel"."color") AS "__order_0""#), "{sql}");
        assert!(keys.contains(r#"GROUP BY "__root"."id""#), "{sql}");
        assert!(keys.contains(r#"ORDER BY "__order_0" DESC, "__key_0" ASC LIMIT ? OFFSET ?"#), "{sql}");
        assert!(sql.contains(r#"AS "__page" ON"#), "{sql}");
        assert!(sql.contains(r#""__root"."id" = "__page"."__key_0""#), "{sql}");
        assert!(sql.ends_with(r#"ORDER BY "__page"."__order_0" DESC, "__page"."__key_0" ASC"#), "{sql}");
        // the filtering join lives only inside the key query
        assert_eq!(sql.matches(r#"LEFT JOIN "cats""#).count(), 1, "{sql}");
    }

    #[test]
    fn test_selected_to_many_join_is_joined_back() {
        let mut qb = Source::Entity(owners_with_cats()).into_builder();
        qb.left_join_and_select(&["cats"]);
        qb.limit(2);
        let sql = sql(&qb);
        assert_eq!(sql.matches(r#"LEFT JOIN "cats" AS "__root_cats_rel""#).count(), 2, "{sql}");
        assert!(sql.contains(r#""__root_cats_rel"."color" AS "cats.color""#), "{sql}");
    }

    #[test]
    fn test_count_counts_distinct_root_keys() {
        let mut qb = Source::Entity(metadata()).into_builder();
        qb.left_join(&["owner"]);
        qb.limit(5);
        let count = DatabaseBackend::Sqlite.build(&qb.build_count()).sql;
        assert!(count.starts_with(r#"SELECT COUNT(*) AS "num_items" FROM (SELECT DISTINCT"#), "{count}");
        assert!(!count.contains("LIMIT"), "{count}");
    }
}
