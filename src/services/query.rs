//! Read coordinator.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::Status;
use tracing::{debug, warn};

use super::{internal_error, ListProductsRequest, ListProductsResponse};
use crate::cache::{category_key, product_key, Cache};
use crate::model::{Category, Product};
use crate::storage::{CatalogStore, StorageError};

/// Point lookups and paged listings over the catalog.
///
/// With a cache configured, point lookups consult it first and fill it after a
/// storage hit. A failing cache only costs the shortcut.
pub struct QueryService {
    store: Arc<dyn CatalogStore>,
    cache: Option<Arc<dyn Cache>>,
}

impl QueryService {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self { store, cache }
    }

    pub async fn get_category(&self, id: u64) -> Result<Category, Status> {
        if id == 0 {
            return Err(Status::invalid_argument("id is required"));
        }

        let key = category_key(id);
        if let Some(category) = self.cached(&key).await {
            return Ok(category);
        }

        match self.store.get_category(id).await {
            Ok(Some(category)) => {
                self.remember(&key, &category).await;
                Ok(category)
            }
            Ok(None) => Err(Status::not_found(format!("category {id} not found"))),
            Err(e) => Err(internal_error("Failed to load category", e)),
        }
    }

    pub async fn get_product(&self, category_id: u64, product_id: u64) -> Result<Product, Status> {
        if category_id == 0 {
            return Err(Status::invalid_argument("categoryId is required"));
        }
        if product_id == 0 {
            return Err(Status::invalid_argument("productId is required"));
        }

        let key = product_key(category_id, product_id);
        if let Some(product) = self.cached(&key).await {
            return Ok(product);
        }

        match self.store.get_product(category_id, product_id).await {
            Ok(Some(product)) => {
                self.remember(&key, &product).await;
                Ok(product)
            }
            Ok(None) => Err(Status::not_found(format!(
                "product {product_id} not found in category {category_id}"
            ))),
            Err(e) => Err(internal_error("Failed to load product", e)),
        }
    }

    pub async fn list_products(
        &self,
        request: ListProductsRequest,
    ) -> Result<ListProductsResponse, Status> {
        if request.category_id == 0 {
            return Err(Status::invalid_argument("categoryId is required"));
        }
        if request.page_size <= 0 {
            return Err(Status::invalid_argument("pageSize must be positive"));
        }

        let page = self
            .store
            .list_products(
                request.category_id,
                request.page_size as u32,
                &request.paging_state,
            )
            .await
            .map_err(|e| match e {
                StorageError::InvalidPagingState(reason) => {
                    Status::invalid_argument(format!("invalid pagingState: {reason}"))
                }
                other => internal_error("Failed to list products", other),
            })?;

        Ok(ListProductsResponse {
            products: page.items,
            paging_state: page.paging_state,
        })
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    async fn remember<T: Serialize>(&self, key: &str, value: &T) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = cache.set(key, bytes).await {
            warn!(key = %key, error = %e, "Cache store failed");
        }
    }
}
