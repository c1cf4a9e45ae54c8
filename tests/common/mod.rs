#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, extract::State, routing::get};
use pagecrate::{
    EntityMetadata, FilterOperator, FilterSpec, PaginateConfig, PaginateError, PaginateQuery, Paginated,
    RelationMetadata, paginate_json,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, RelationTrait, Schema};
use serde_json::Value as JsonValue;

pub mod cat_entity;
pub mod owner_entity;

/// Visible cats; one more row (`Ghost`, id 26) is soft-deleted.
///
/// Cat `i` (1..=25) is named `Cat {i:02}` and has:
/// - color `black` when `i % 3 == 0`, `white` when `i % 3 == 1`, `ginger` otherwise (8/9/8)
/// - age `NULL` when `i % 5 == 0`, otherwise `i % 7`
/// - no owner when `i % 4 == 0`, Bob (2) for other even `i`, Ann (1) for odd `i` (6/6/13)
pub const CAT_COUNT: u64 = 25;

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(&schema.create_table_from_entity(owner_entity::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(cat_entity::Entity)))
        .await?;
    seed(&db).await?;
    Ok(db)
}

async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared("INSERT INTO owners (id, name) VALUES (1, 'Ann'), (2, 'Bob'), (3, 'Cleo')")
        .await?;
    let rows: Vec<String> = (1..=25usize)
        .map(|i| {
            let color = ["black", "white", "ginger"][i % 3];
            let age = if i % 5 == 0 { "NULL".to_string() } else { (i % 7).to_string() };
            let owner = match (i % 4, i % 2) {
                (0, _) => "NULL",
                (_, 0) => "2",
                _ => "1",
            };
            format!("({i}, 'Cat {i:02}', '{color}', {age}, {owner}, NULL)")
        })
        .collect();
    db.execute_unprepared(&format!(
        "INSERT INTO cats (id, name, color, age, owner_id, deleted_at) VALUES {}",
        rows.join(", ")
    ))
    .await?;
    db.execute_unprepared(
        "INSERT INTO cats (id, name, color, age, owner_id, deleted_at) \
         VALUES (26, 'Ghost', 'black', 1, 1, '2024-01-01T00:00:00Z')",
    )
    .await?;
    Ok(())
}

pub fn owner_metadata() -> Arc<EntityMetadata> {
    Arc::new(EntityMetadata::from_entity::<owner_entity::Entity>())
}

pub fn cat_metadata() -> Arc<EntityMetadata> {
    let owner = RelationMetadata::from_def("owner", &cat_entity::Relation::Owner.def(), owner_metadata());
    Arc::new(
        EntityMetadata::from_entity::<cat_entity::Entity>()
            .relation(owner)
            .soft_delete("deleted_at"),
    )
}

pub fn cat_metadata_with_eager_owner() -> Arc<EntityMetadata> {
    let owner = RelationMetadata::from_def("owner", &cat_entity::Relation::Owner.def(), owner_metadata()).eager();
    Arc::new(
        EntityMetadata::from_entity::<cat_entity::Entity>()
            .relation(owner)
            .soft_delete("deleted_at"),
    )
}

pub fn cat_config() -> PaginateConfig {
    PaginateConfig::new(["id", "name", "age", "owner.name"])
        .with_searchable_columns(["name", "color"])
        .with_filterable_column("color", FilterSpec::Any)
        .with_filterable_column("age", FilterSpec::Any)
        .with_filterable_column("owner.name", FilterSpec::operators([FilterOperator::Eq, FilterOperator::In]))
        .with_relations(["owner"])
        .with_default_limit(10)
}

async fn list_cats(
    State(db): State<DatabaseConnection>,
    query: PaginateQuery,
) -> Result<Paginated<JsonValue>, PaginateError> {
    paginate_json(&query, cat_metadata(), &cat_config(), &db).await
}

async fn list_misconfigured(
    State(db): State<DatabaseConnection>,
    query: PaginateQuery,
) -> Result<Paginated<JsonValue>, PaginateError> {
    let config = PaginateConfig::new(Vec::<String>::new());
    paginate_json(&query, cat_metadata(), &config, &db).await
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let api = Router::new()
        .route("/cats", get(list_cats))
        .route("/broken", get(list_misconfigured))
        .with_state(db);
    Router::new().nest("/api/v1", api)
}

/// Ids of JSON rows, in order.
pub fn ids(page: &Paginated<JsonValue>) -> Vec<i64> {
    page.data.iter().filter_map(|row| row["id"].as_i64()).collect()
}
