//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Categories table schema.
#[derive(Iden)]
pub enum Categories {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "description"]
    Description,
    #[iden = "created_at"]
    CreatedAt,
}

/// Products table schema, partitioned by category.
#[derive(Iden)]
pub enum Products {
    Table,
    #[iden = "category_id"]
    CategoryId,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "description"]
    Description,
    #[iden = "price"]
    Price,
    #[iden = "stock"]
    Stock,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Outbox table schema.
#[derive(Iden)]
pub enum Outbox {
    Table,
    #[iden = "bucket"]
    Bucket,
    #[iden = "id"]
    Id,
    #[iden = "event_type"]
    EventType,
    #[iden = "payload"]
    Payload,
}

/// SQL for creating the categories table.
pub const CREATE_CATEGORIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER NOT NULL PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// SQL for creating the products table.
pub const CREATE_PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    category_id INTEGER NOT NULL,
    id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    price REAL NOT NULL,
    stock INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (category_id, id)
);
"#;

/// SQL for creating the outbox table.
///
/// Ids are hyphenated lowercase UUIDv7 text, so `ORDER BY id` is creation order.
pub const CREATE_OUTBOX_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS outbox (
    bucket TEXT NOT NULL,
    id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (bucket, id)
);
"#;
