//! Write coordinator.
//!
//! Each create validates its input, assigns an id, and commits the entity row
//! together with an outbox envelope in one batch. Nothing is published here;
//! the relay picks the envelope up later.

use std::sync::Arc;

use tonic::Status;
use tracing::info;

use super::{internal_error, require_text, CreateCategoryRequest, CreateProductRequest};
use crate::id::IdGenerator;
use crate::model::{write_timestamp, Category, Product};
use crate::outbox::OutboxEnvelope;
use crate::storage::{CatalogStore, WriteBatch};

/// Write coordinator for categories and products.
pub struct CommandService {
    store: Arc<dyn CatalogStore>,
    ids: Arc<dyn IdGenerator>,
}

impl CommandService {
    pub fn new(store: Arc<dyn CatalogStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    pub async fn create_category(&self, request: CreateCategoryRequest) -> Result<Category, Status> {
        require_text("name", &request.name)?;
        require_text("description", &request.description)?;

        let id = self
            .ids
            .generate_id()
            .map_err(|e| internal_error("Failed to generate category id", e))?;
        let now = write_timestamp();
        let category = Category {
            id,
            name: request.name,
            description: request.description,
            created_at: now,
        };

        let envelope = OutboxEnvelope::created(&category, now)
            .map_err(|e| internal_error("Failed to encode category event", e))?;
        let envelope_id = envelope.id;

        self.store
            .execute_batch(
                WriteBatch::new()
                    .put_category(category.clone())
                    .append_outbox(envelope),
            )
            .await
            .map_err(|e| internal_error("Failed to persist category", e))?;

        info!(id = category.id, envelope_id = %envelope_id, "Category created");
        Ok(category)
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> Result<Product, Status> {
        require_text("name", &request.name)?;
        require_text("description", &request.description)?;
        let price = request
            .price
            .ok_or_else(|| Status::invalid_argument("price is required"))?;
        if !price.is_finite() {
            return Err(Status::invalid_argument("price must be a finite number"));
        }
        let stock = request
            .stock
            .ok_or_else(|| Status::invalid_argument("stock is required"))?;
        let category_id = request
            .category_id
            .filter(|id| *id != 0)
            .ok_or_else(|| Status::invalid_argument("categoryId is required"))?;

        let id = self
            .ids
            .generate_id()
            .map_err(|e| internal_error("Failed to generate product id", e))?;
        let now = write_timestamp();
        let product = Product {
            id,
            category_id,
            name: request.name,
            description: request.description,
            price,
            stock,
            created_at: now,
            updated_at: now,
        };

        let envelope = OutboxEnvelope::created(&product, now)
            .map_err(|e| internal_error("Failed to encode product event", e))?;
        let envelope_id = envelope.id;

        self.store
            .execute_batch(
                WriteBatch::new()
                    .put_product(product.clone())
                    .append_outbox(envelope),
            )
            .await
            .map_err(|e| internal_error("Failed to persist product", e))?;

        info!(
            id = product.id,
            category_id = product.category_id,
            envelope_id = %envelope_id,
            "Product created"
        );
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tonic::Code;

    use super::*;
    use crate::id::SnowflakeGenerator;
    use crate::outbox::current_bucket;
    use crate::storage::{MockCatalogStore, OutboxStore};

    fn generator() -> Arc<SnowflakeGenerator> {
        let ids = SnowflakeGenerator::new(3, Utc::now() - Duration::days(1));
        ids.init().unwrap();
        Arc::new(ids)
    }

    fn service() -> (CommandService, Arc<MockCatalogStore>) {
        let store = Arc::new(MockCatalogStore::new());
        (CommandService::new(store.clone(), generator()), store)
    }

    fn widget() -> CreateProductRequest {
        CreateProductRequest {
            name: "Widget".to_string(),
            description: "d".to_string(),
            price: Some(9.99),
            stock: Some(5),
            category_id: Some(1),
        }
    }

    #[tokio::test]
    async fn test_create_category_writes_entity_and_envelope() {
        let (service, store) = service();

        let category = service
            .create_category(CreateCategoryRequest {
                name: "Books".to_string(),
                description: "Paper".to_string(),
            })
            .await
            .unwrap();

        assert!(category.id > 0);
        assert_eq!(store.get_category(category.id).await.unwrap(), Some(category));

        let pending = store.fetch_pending(&current_bucket()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "category.created");
    }

    #[tokio::test]
    async fn test_create_category_requires_fields() {
        let (service, store) = service();

        let status = service
            .create_category(CreateCategoryRequest {
                name: String::new(),
                description: "d".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(store.category_count().await, 0);
        assert_eq!(store.outbox_len().await, 0);
    }

    #[tokio::test]
    async fn test_create_product_accepts_zero_price_and_stock() {
        let (service, _store) = service();

        let product = service
            .create_product(CreateProductRequest {
                price: Some(0.0),
                stock: Some(0),
                ..widget()
            })
            .await
            .unwrap();

        assert_eq!(product.price, 0.0);
        assert_eq!(product.stock, 0);
        assert_eq!(product.created_at, product.updated_at);
    }

    #[tokio::test]
    async fn test_create_product_rejects_missing_fields() {
        let (service, store) = service();

        let cases = [
            CreateProductRequest { price: None, ..widget() },
            CreateProductRequest { stock: None, ..widget() },
            CreateProductRequest { category_id: None, ..widget() },
            CreateProductRequest { category_id: Some(0), ..widget() },
            CreateProductRequest { description: String::new(), ..widget() },
            CreateProductRequest { price: Some(f64::NAN), ..widget() },
            CreateProductRequest { price: Some(f64::INFINITY), ..widget() },
            CreateProductRequest { price: Some(f64::NEG_INFINITY), ..widget() },
        ];
        for request in cases {
            let status = service.create_product(request).await.unwrap_err();
            assert_eq!(status.code(), Code::InvalidArgument);
        }

        assert_eq!(store.product_count().await, 0);
        assert_eq!(store.outbox_len().await, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_opaque_internal() {
        let (service, store) = service();
        store.set_fail_on_batch(true).await;

        let status = service.create_product(widget()).await.unwrap_err();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal error");
        assert_eq!(store.product_count().await, 0);
        assert_eq!(store.outbox_len().await, 0);
    }

    #[tokio::test]
    async fn test_id_generator_failure_is_internal() {
        let store = Arc::new(MockCatalogStore::new());
        let ids = Arc::new(SnowflakeGenerator::new(1, Utc::now() - Duration::days(1)));
        let service = CommandService::new(store.clone(), ids);

        let status = service.create_product(widget()).await.unwrap_err();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(store.outbox_len().await, 0);
    }
}
