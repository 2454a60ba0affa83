//! SQLite implementation of the catalog and outbox stores.
//!
//! One pool backs both traits. Batches run inside a `BEGIN IMMEDIATE`
//! transaction; product paging is keyset-based on `(category_id, id)`.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::model::{Category, Product};
use crate::outbox::OutboxEnvelope;
use crate::storage::schema::{CREATE_CATEGORIES_TABLE, CREATE_OUTBOX_TABLE, CREATE_PRODUCTS_TABLE};
use crate::storage::{Result, StorageError};

mod catalog_store;
mod outbox_store;

/// Path that keeps the database in process memory.
const IN_MEMORY: &str = ":memory:";

/// SQLite-backed catalog and outbox store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `path`.
    ///
    /// `:memory:` gets a single long-lived connection, since every SQLite
    /// connection to `:memory:` is its own database.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = if path == IN_MEMORY {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            SqlitePoolOptions::new().connect_with(options).await?
        };

        debug!(path = %path, "SQLite pool opened");
        Ok(Self::new(pool))
    }

    /// Create tables if they do not exist.
    pub async fn init(&self) -> Result<()> {
        for ddl in [CREATE_CATEGORIES_TABLE, CREATE_PRODUCTS_TABLE, CREATE_OUTBOX_TABLE] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidTimestamp(format!("{}: {}", raw, e)))
}

/// Map a failed insert, reporting primary key collisions as `Duplicate`.
fn insert_error(e: sqlx::Error, what: String) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Duplicate(what),
        _ => StorageError::Database(e),
    }
}

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Category {
        id: row.try_get::<i64, _>("id")? as u64,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<Product> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Product {
        id: row.try_get::<i64, _>("id")? as u64,
        category_id: row.try_get::<i64, _>("category_id")? as u64,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        stock: row.try_get("stock")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn envelope_from_row(row: &SqliteRow) -> Result<OutboxEnvelope> {
    let id: String = row.try_get("id")?;
    Ok(OutboxEnvelope {
        id: id.parse()?,
        bucket: row.try_get("bucket")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
    })
}
