//! SQLite CatalogStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::SqliteConnection;

use super::{category_from_row, format_timestamp, insert_error, product_from_row, SqliteStore};
use crate::model::{Category, Product};
use crate::storage::schema::{Categories, Outbox, Products};
use crate::storage::{CatalogStore, Mutation, Page, PagingState, Result, WriteBatch};

impl SqliteStore {
    /// Run each mutation on an already-started transaction.
    async fn apply_mutations(conn: &mut SqliteConnection, batch: WriteBatch) -> Result<()> {
        for mutation in batch.into_mutations() {
            let (query, what) = match mutation {
                Mutation::PutCategory(c) => (
                    Query::insert()
                        .into_table(Categories::Table)
                        .columns([
                            Categories::Id,
                            Categories::Name,
                            Categories::Description,
                            Categories::CreatedAt,
                        ])
                        .values_panic([
                            (c.id as i64).into(),
                            c.name.into(),
                            c.description.into(),
                            format_timestamp(&c.created_at).into(),
                        ])
                        .to_string(SqliteQueryBuilder),
                    format!("category {}", c.id),
                ),
                Mutation::PutProduct(p) => (
                    Query::insert()
                        .into_table(Products::Table)
                        .columns([
                            Products::CategoryId,
                            Products::Id,
                            Products::Name,
                            Products::Description,
                            Products::Price,
                            Products::Stock,
                            Products::CreatedAt,
                            Products::UpdatedAt,
                        ])
                        .values_panic([
                            (p.category_id as i64).into(),
                            (p.id as i64).into(),
                            p.name.into(),
                            p.description.into(),
                            p.price.into(),
                            p.stock.into(),
                            format_timestamp(&p.created_at).into(),
                            format_timestamp(&p.updated_at).into(),
                        ])
                        .to_string(SqliteQueryBuilder),
                    format!("product {}/{}", p.category_id, p.id),
                ),
                Mutation::AppendOutbox(e) => (
                    Query::insert()
                        .into_table(Outbox::Table)
                        .columns([Outbox::Bucket, Outbox::Id, Outbox::EventType, Outbox::Payload])
                        .values_panic([
                            e.bucket.clone().into(),
                            e.id.to_string().into(),
                            e.event_type.into(),
                            e.payload.into(),
                        ])
                        .to_string(SqliteQueryBuilder),
                    format!("outbox {}/{}", e.bucket, e.id),
                ),
            };

            sqlx::query(&query)
                .execute(&mut *conn)
                .await
                .map_err(|e| insert_error(e, what))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn execute_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // IMMEDIATE takes the write lock up front so concurrent batches queue
        // instead of failing on lock upgrade. Dropping `tx` before commit rolls
        // back, including when the caller abandons this future.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Self::apply_mutations(&mut tx, batch).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_category(&self, id: u64) -> Result<Option<Category>> {
        let query = Query::select()
            .columns([
                Categories::Id,
                Categories::Name,
                Categories::Description,
                Categories::CreatedAt,
            ])
            .from(Categories::Table)
            .and_where(Expr::col(Categories::Id).eq(id as i64))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn get_product(&self, category_id: u64, product_id: u64) -> Result<Option<Product>> {
        let query = product_select()
            .and_where(Expr::col(Products::CategoryId).eq(category_id as i64))
            .and_where(Expr::col(Products::Id).eq(product_id as i64))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(
        &self,
        category_id: u64,
        page_size: u32,
        paging_state: &PagingState,
    ) -> Result<Page<Product>> {
        let resume_after = paging_state.resume_after()?;
        let query = {
            let mut select = product_select();
            select
                .and_where(Expr::col(Products::CategoryId).eq(category_id as i64))
                .order_by(Products::Id, Order::Asc)
                .limit(u64::from(page_size) + 1);
            if let Some(after) = resume_after {
                select.and_where(Expr::col(Products::Id).gt(after as i64));
            }
            select.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let products = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::from_lookahead(products, page_size as usize, |p| p.id))
    }
}

fn product_select() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            Products::CategoryId,
            Products::Id,
            Products::Name,
            Products::Description,
            Products::Price,
            Products::Stock,
            Products::CreatedAt,
            Products::UpdatedAt,
        ])
        .from(Products::Table)
        .to_owned()
}
