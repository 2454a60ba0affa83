//! CatalogStore interface tests.
//!
//! These tests verify the contract of the CatalogStore trait.
//! Each storage implementation should run these tests. Every test works in
//! its own category id range so one store instance can run the whole suite.

use catalog_cqrs::model::{write_timestamp, Category, Product};
use catalog_cqrs::outbox::OutboxEnvelope;
use catalog_cqrs::storage::{CatalogStore, OutboxStore, PagingState, StorageError, WriteBatch};

pub fn make_category(id: u64) -> Category {
    Category {
        id,
        name: format!("Category {}", id),
        description: "test category".to_string(),
        created_at: write_timestamp(),
    }
}

pub fn make_product(category_id: u64, id: u64) -> Product {
    let now = write_timestamp();
    Product {
        id,
        category_id,
        name: format!("Product {}", id),
        description: "test product".to_string(),
        price: id as f64 + 0.25,
        stock: id as i32,
        created_at: now,
        updated_at: now,
    }
}

/// Walk every page of a category and return the pages' item ids.
pub async fn collect_pages<S: CatalogStore>(store: &S, category_id: u64, page_size: u32) -> Vec<Vec<u64>> {
    let mut pages = Vec::new();
    let mut state = PagingState::empty();
    loop {
        let page = store
            .list_products(category_id, page_size, &state)
            .await
            .expect("list should succeed");
        pages.push(page.items.iter().map(|p| p.id).collect());
        if page.paging_state.is_empty() {
            break;
        }
        state = page.paging_state;
    }
    pages
}

// =============================================================================
// Point lookups
// =============================================================================

pub async fn test_category_round_trip<S: CatalogStore>(store: &S) {
    let category = make_category(101);

    store
        .execute_batch(WriteBatch::new().put_category(category.clone()))
        .await
        .expect("batch should succeed");

    let loaded = store.get_category(101).await.expect("get should succeed");
    assert_eq!(loaded, Some(category), "stored category should read back unchanged");
}

pub async fn test_product_round_trip<S: CatalogStore>(store: &S) {
    let product = make_product(201, 7);

    store
        .execute_batch(WriteBatch::new().put_product(product.clone()))
        .await
        .expect("batch should succeed");

    let loaded = store.get_product(201, 7).await.expect("get should succeed");
    assert_eq!(loaded, Some(product), "stored product should read back unchanged");

    let other_partition = store.get_product(202, 7).await.expect("get should succeed");
    assert_eq!(other_partition, None, "product is scoped to its category");
}

pub async fn test_get_missing<S: CatalogStore>(store: &S) {
    assert_eq!(store.get_category(999_999).await.expect("get should succeed"), None);
    assert_eq!(store.get_product(999_999, 1).await.expect("get should succeed"), None);
}

// =============================================================================
// Batches
// =============================================================================

pub async fn test_batch_commits_entity_with_envelope<S: CatalogStore + OutboxStore>(store: &S) {
    let category = make_category(401);
    let mut envelope = OutboxEnvelope::created(&category, category.created_at).unwrap();
    envelope.bucket = "test-commit".to_string();

    store
        .execute_batch(
            WriteBatch::new()
                .put_category(category.clone())
                .append_outbox(envelope.clone()),
        )
        .await
        .expect("batch should succeed");

    assert_eq!(store.get_category(401).await.unwrap(), Some(category));
    assert_eq!(store.fetch_pending("test-commit").await.unwrap(), vec![envelope]);
}

pub async fn test_batch_is_atomic<S: CatalogStore + OutboxStore>(store: &S) {
    let envelope = OutboxEnvelope::new("test-atomic", "product.created", "{}");
    store
        .execute_batch(WriteBatch::new().append_outbox(envelope.clone()))
        .await
        .expect("seed batch should succeed");

    let result = store
        .execute_batch(
            WriteBatch::new()
                .put_product(make_product(301, 1))
                .append_outbox(envelope),
        )
        .await;

    assert!(
        matches!(result, Err(StorageError::Duplicate(_))),
        "colliding envelope should reject the batch"
    );
    assert_eq!(
        store.get_product(301, 1).await.unwrap(),
        None,
        "no statement of a rejected batch is observable"
    );
    assert_eq!(store.fetch_pending("test-atomic").await.unwrap().len(), 1);
}

pub async fn test_empty_batch<S: CatalogStore>(store: &S) {
    store
        .execute_batch(WriteBatch::new())
        .await
        .expect("empty batch should succeed");
}

// =============================================================================
// Paging
// =============================================================================

pub async fn test_list_products_pages_completely<S: CatalogStore>(store: &S) {
    let mut batch = WriteBatch::new();
    for id in [13, 10, 14, 12, 11] {
        batch = batch.put_product(make_product(501, id));
    }
    batch = batch.put_product(make_product(502, 1));
    store.execute_batch(batch).await.expect("batch should succeed");

    let pages = collect_pages(store, 501, 2).await;

    assert_eq!(pages, vec![vec![10, 11], vec![12, 13], vec![14]]);
}

pub async fn test_list_products_exact_multiple<S: CatalogStore>(store: &S) {
    let mut batch = WriteBatch::new();
    for id in 1..=4 {
        batch = batch.put_product(make_product(503, id));
    }
    store.execute_batch(batch).await.expect("batch should succeed");

    let pages = collect_pages(store, 503, 2).await;

    assert_eq!(pages, vec![vec![1, 2], vec![3, 4]], "no trailing empty page");
}

pub async fn test_list_products_empty_category<S: CatalogStore>(store: &S) {
    let page = store
        .list_products(504, 10, &PagingState::empty())
        .await
        .expect("list should succeed");

    assert!(page.items.is_empty());
    assert!(page.paging_state.is_empty());
}

pub async fn test_list_products_rejects_malformed_state<S: CatalogStore>(store: &S) {
    let result = store
        .list_products(505, 10, &PagingState::from_bytes(b"garbage".to_vec()))
        .await;

    assert!(matches!(result, Err(StorageError::InvalidPagingState(_))));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all CatalogStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_catalog_store_tests {
    ($store:expr) => {
        use $crate::storage::catalog_store_tests::*;

        // point lookups
        test_category_round_trip($store).await;
        println!("  test_category_round_trip: PASSED");

        test_product_round_trip($store).await;
        println!("  test_product_round_trip: PASSED");

        test_get_missing($store).await;
        println!("  test_get_missing: PASSED");

        // batches
        test_batch_commits_entity_with_envelope($store).await;
        println!("  test_batch_commits_entity_with_envelope: PASSED");

        test_batch_is_atomic($store).await;
        println!("  test_batch_is_atomic: PASSED");

        test_empty_batch($store).await;
        println!("  test_empty_batch: PASSED");

        // paging
        test_list_products_pages_completely($store).await;
        println!("  test_list_products_pages_completely: PASSED");

        test_list_products_exact_multiple($store).await;
        println!("  test_list_products_exact_multiple: PASSED");

        test_list_products_empty_category($store).await;
        println!("  test_list_products_empty_category: PASSED");

        test_list_products_rejects_malformed_state($store).await;
        println!("  test_list_products_rejects_malformed_state: PASSED");
    };
}
