//! Mock storage implementation for testing.
//!
//! Entities and the outbox live behind a single lock so a batch is applied
//! atomically, the same guarantee the SQL backend gives through a transaction.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, Mutation, OutboxStore, Page, PagingState, Result, StorageError, WriteBatch};
use crate::model::{Category, Product};
use crate::outbox::OutboxEnvelope;

#[derive(Default)]
struct Tables {
    categories: BTreeMap<u64, Category>,
    /// Keyed by (category_id, product_id) so a range scan is one partition in id order.
    products: BTreeMap<(u64, u64), Product>,
    outbox: BTreeMap<(String, Uuid), OutboxEnvelope>,
}

impl Tables {
    fn check(&self, mutation: &Mutation) -> Result<()> {
        let taken = match mutation {
            Mutation::PutCategory(c) => self.categories.contains_key(&c.id),
            Mutation::PutProduct(p) => self.products.contains_key(&(p.category_id, p.id)),
            Mutation::AppendOutbox(e) => self.outbox.contains_key(&(e.bucket.clone(), e.id)),
        };
        if taken {
            return Err(StorageError::Duplicate(describe(mutation)));
        }
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::PutCategory(c) => {
                self.categories.insert(c.id, c);
            }
            Mutation::PutProduct(p) => {
                self.products.insert((p.category_id, p.id), p);
            }
            Mutation::AppendOutbox(e) => {
                self.outbox.insert((e.bucket.clone(), e.id), e);
            }
        }
    }
}

fn describe(mutation: &Mutation) -> String {
    match mutation {
        Mutation::PutCategory(c) => format!("category {}", c.id),
        Mutation::PutProduct(p) => format!("product {}/{}", p.category_id, p.id),
        Mutation::AppendOutbox(e) => format!("outbox {}/{}", e.bucket, e.id),
    }
}

/// In-memory catalog and outbox store.
#[derive(Default)]
pub struct MockCatalogStore {
    tables: RwLock<Tables>,
    fail_on_batch: RwLock<bool>,
    fail_on_read: RwLock<bool>,
    fail_on_fetch: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
}

impl MockCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_batch(&self, fail: bool) {
        *self.fail_on_batch.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    pub async fn set_fail_on_fetch(&self, fail: bool) {
        *self.fail_on_fetch.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    /// Number of envelopes across all buckets.
    pub async fn outbox_len(&self) -> usize {
        self.tables.read().await.outbox.len()
    }

    pub async fn category_count(&self) -> usize {
        self.tables.read().await.categories.len()
    }

    pub async fn product_count(&self) -> usize {
        self.tables.read().await.products.len()
    }

    /// Place an envelope directly in the outbox, bypassing the batch path.
    pub async fn insert_envelope(&self, envelope: OutboxEnvelope) {
        self.tables
            .write()
            .await
            .outbox
            .insert((envelope.bucket.clone(), envelope.id), envelope);
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn execute_batch(&self, batch: WriteBatch) -> Result<()> {
        if *self.fail_on_batch.read().await {
            return Err(StorageError::Unavailable("mock batch failure".to_string()));
        }

        let mut tables = self.tables.write().await;
        let mut staged = HashSet::new();
        for mutation in batch.mutations() {
            tables.check(mutation)?;
            let key = describe(mutation);
            if !staged.insert(key.clone()) {
                return Err(StorageError::Duplicate(key));
            }
        }
        for mutation in batch.into_mutations() {
            tables.apply(mutation);
        }
        Ok(())
    }

    async fn get_category(&self, id: u64) -> Result<Option<Category>> {
        self.check_read().await?;
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn get_product(&self, category_id: u64, product_id: u64) -> Result<Option<Product>> {
        self.check_read().await?;
        Ok(self
            .tables
            .read()
            .await
            .products
            .get(&(category_id, product_id))
            .cloned())
    }

    async fn list_products(
        &self,
        category_id: u64,
        page_size: u32,
        paging_state: &PagingState,
    ) -> Result<Page<Product>> {
        self.check_read().await?;
        let start = match paging_state.resume_after()? {
            Some(after) => match after.checked_add(1) {
                Some(next) => next,
                None => return Ok(Page::from_lookahead(Vec::new(), 0, |p: &Product| p.id)),
            },
            None => 0,
        };

        let page_size = page_size as usize;
        let rows: Vec<Product> = self
            .tables
            .read()
            .await
            .products
            .range((category_id, start)..=(category_id, u64::MAX))
            .take(page_size + 1)
            .map(|(_, p)| p.clone())
            .collect();

        Ok(Page::from_lookahead(rows, page_size, |p| p.id))
    }
}

#[async_trait]
impl OutboxStore for MockCatalogStore {
    async fn fetch_pending(&self, bucket: &str) -> Result<Vec<OutboxEnvelope>> {
        if *self.fail_on_fetch.read().await {
            return Err(StorageError::Unavailable("mock fetch failure".to_string()));
        }
        Ok(self
            .tables
            .read()
            .await
            .outbox
            .values()
            .filter(|e| e.bucket == bucket)
            .cloned()
            .collect())
    }

    async fn delete(&self, bucket: &str, id: Uuid) -> Result<()> {
        if *self.fail_on_delete.read().await {
            return Err(StorageError::Unavailable("mock delete failure".to_string()));
        }
        self.tables
            .write()
            .await
            .outbox
            .remove(&(bucket.to_string(), id));
        Ok(())
    }
}
