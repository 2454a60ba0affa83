//! Storage engine interfaces and implementations.
//!
//! Two traits front the same engine:
//! - [`CatalogStore`]: atomic batch writes, point lookups and cursor paging.
//! - [`OutboxStore`]: the day-bucketed scan/delete view of pending envelopes.
//!
//! Both are implemented by the in-memory [`MockCatalogStore`] and, with the
//! `sqlite` feature, by [`SqliteStore`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::config::{StorageConfig, StorageType};
use crate::model::{Category, Product};
use crate::outbox::OutboxEnvelope;

pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use mock::MockCatalogStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Invalid paging state: {0}")]
    InvalidPagingState(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One statement in an atomic batch.
#[derive(Debug, Clone)]
pub enum Mutation {
    PutCategory(Category),
    PutProduct(Product),
    AppendOutbox(OutboxEnvelope),
}

/// Statements that commit together or not at all.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_category(mut self, category: Category) -> Self {
        self.mutations.push(Mutation::PutCategory(category));
        self
    }

    pub fn put_product(mut self, product: Product) -> Self {
        self.mutations.push(Mutation::PutProduct(product));
        self
    }

    pub fn append_outbox(mut self, envelope: OutboxEnvelope) -> Self {
        self.mutations.push(Mutation::AppendOutbox(envelope));
        self
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Version tag of the paging state encoding.
const PAGING_STATE_V1: u8 = 1;

/// Opaque continuation token for paged listings.
///
/// Callers must treat the bytes as opaque and pass them back verbatim. An
/// empty state means "from the beginning" on input and "no further pages" on
/// output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagingState(Vec<u8>);

impl PagingState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position after the given clustering key.
    pub(crate) fn after(key: u64) -> Self {
        let mut bytes = Vec::with_capacity(9);
        bytes.push(PAGING_STATE_V1);
        bytes.extend_from_slice(&key.to_be_bytes());
        Self(bytes)
    }

    /// Decode the clustering key to resume after, `None` for a fresh scan.
    pub(crate) fn resume_after(&self) -> Result<Option<u64>> {
        match self.0.as_slice() {
            [] => Ok(None),
            [PAGING_STATE_V1, rest @ ..] => {
                let key: [u8; 8] = rest.try_into().map_err(|_| {
                    StorageError::InvalidPagingState(format!(
                        "expected 8 position bytes, got {}",
                        rest.len()
                    ))
                })?;
                Ok(Some(u64::from_be_bytes(key)))
            }
            [version, ..] => Err(StorageError::InvalidPagingState(format!(
                "unknown encoding version {}",
                version
            ))),
        }
    }
}

/// One page of a listing plus the token for the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paging_state: PagingState,
}

impl<T> Page<T> {
    /// Build a page from up to `page_size + 1` rows: the extra row, if
    /// present, only signals that another page exists.
    pub(crate) fn from_lookahead(
        mut rows: Vec<T>,
        page_size: usize,
        key: impl Fn(&T) -> u64,
    ) -> Self {
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);
        let paging_state = match rows.last() {
            Some(last) if has_more => PagingState::after(key(last)),
            _ => PagingState::empty(),
        };
        Self {
            items: rows,
            paging_state,
        }
    }
}

/// Entity persistence: atomic batches, point lookups and cursor paging.
///
/// Implementations:
/// - `MockCatalogStore`: in-memory
/// - `SqliteStore`: SQLite via sqlx
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Apply every mutation in the batch, or none of them.
    async fn execute_batch(&self, batch: WriteBatch) -> Result<()>;

    /// Look up a category by id.
    async fn get_category(&self, id: u64) -> Result<Option<Category>>;

    /// Look up a product within its category partition.
    async fn get_product(&self, category_id: u64, product_id: u64) -> Result<Option<Product>>;

    /// One page of a category's products in ascending product id order.
    async fn list_products(
        &self,
        category_id: u64,
        page_size: u32,
        paging_state: &PagingState,
    ) -> Result<Page<Product>>;
}

/// Day-bucketed view of pending outbox envelopes.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Every envelope in the bucket, ascending by id. Empty for an unknown bucket.
    async fn fetch_pending(&self, bucket: &str) -> Result<Vec<OutboxEnvelope>>;

    /// Remove an envelope. Removing an absent envelope succeeds.
    async fn delete(&self, bucket: &str, id: Uuid) -> Result<()>;
}

/// Initialize storage based on configuration.
///
/// Returns both views of the same engine so the write path and the relay
/// share one set of tables.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<(Arc<dyn CatalogStore>, Arc<dyn OutboxStore>), Box<dyn std::error::Error>>
{
    match config.storage_type {
        StorageType::Memory => {
            info!(storage_type = "memory", "Storage initialized");
            let store = Arc::new(MockCatalogStore::new());
            Ok((store.clone(), store))
        }
        StorageType::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                let store = Arc::new(SqliteStore::connect(&config.sqlite.path).await?);
                store.init().await?;
                info!(storage_type = "sqlite", path = %config.sqlite.path, "Storage initialized");
                Ok((store.clone(), store))
            }

            #[cfg(not(feature = "sqlite"))]
            {
                Err("SQLite support requires the 'sqlite' feature. Rebuild with --features sqlite".into())
            }
        }
    }
}
