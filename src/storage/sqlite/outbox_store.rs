//! SQLite OutboxStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use uuid::Uuid;

use super::{envelope_from_row, SqliteStore};
use crate::outbox::OutboxEnvelope;
use crate::storage::schema::Outbox;
use crate::storage::{OutboxStore, Result};

#[async_trait]
impl OutboxStore for SqliteStore {
    async fn fetch_pending(&self, bucket: &str) -> Result<Vec<OutboxEnvelope>> {
        let query = Query::select()
            .columns([Outbox::Bucket, Outbox::Id, Outbox::EventType, Outbox::Payload])
            .from(Outbox::Table)
            .and_where(Expr::col(Outbox::Bucket).eq(bucket))
            .order_by(Outbox::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(envelope_from_row).collect()
    }

    async fn delete(&self, bucket: &str, id: Uuid) -> Result<()> {
        let query = Query::delete()
            .from_table(Outbox::Table)
            .and_where(Expr::col(Outbox::Bucket).eq(bucket))
            .and_where(Expr::col(Outbox::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }
}
