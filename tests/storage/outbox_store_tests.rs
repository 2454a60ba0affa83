//! OutboxStore interface tests.
//!
//! Envelopes enter through `CatalogStore::execute_batch`, so implementations
//! must provide both traits. Each test uses its own bucket.

use catalog_cqrs::outbox::OutboxEnvelope;
use catalog_cqrs::storage::{CatalogStore, OutboxStore, WriteBatch};
use uuid::Uuid;

async fn append<S: CatalogStore>(store: &S, envelopes: &[OutboxEnvelope]) {
    let mut batch = WriteBatch::new();
    for envelope in envelopes {
        batch = batch.append_outbox(envelope.clone());
    }
    store.execute_batch(batch).await.expect("append should succeed");
}

pub async fn test_fetch_empty_bucket<S: CatalogStore + OutboxStore>(store: &S) {
    let pending = store
        .fetch_pending("test-empty")
        .await
        .expect("fetch should succeed");
    assert!(pending.is_empty(), "unknown bucket yields nothing");
}

pub async fn test_fetch_ascending_by_id<S: CatalogStore + OutboxStore>(store: &S) {
    let first = OutboxEnvelope::new("test-order", "category.created", "{\"n\":1}");
    let second = OutboxEnvelope::new("test-order", "category.created", "{\"n\":2}");
    let third = OutboxEnvelope::new("test-order", "product.created", "{\"n\":3}");

    append(store, &[third.clone()]).await;
    append(store, &[first.clone(), second.clone()]).await;

    let pending = store.fetch_pending("test-order").await.unwrap();
    assert_eq!(pending, vec![first, second, third], "creation order, not insert order");
}

pub async fn test_fetch_scoped_to_bucket<S: CatalogStore + OutboxStore>(store: &S) {
    let mine = OutboxEnvelope::new("test-scope-a", "category.created", "{}");
    let theirs = OutboxEnvelope::new("test-scope-b", "category.created", "{}");
    append(store, &[mine.clone(), theirs]).await;

    let pending = store.fetch_pending("test-scope-a").await.unwrap();
    assert_eq!(pending, vec![mine]);
}

pub async fn test_fetch_is_restartable<S: CatalogStore + OutboxStore>(store: &S) {
    append(
        store,
        &[
            OutboxEnvelope::new("test-restart", "category.created", "{}"),
            OutboxEnvelope::new("test-restart", "category.created", "{}"),
        ],
    )
    .await;

    let once = store.fetch_pending("test-restart").await.unwrap();
    let twice = store.fetch_pending("test-restart").await.unwrap();
    assert_eq!(once, twice, "each fetch is a fresh full scan");
}

pub async fn test_delete_removes_envelope<S: CatalogStore + OutboxStore>(store: &S) {
    let keep = OutboxEnvelope::new("test-delete", "category.created", "{}");
    let removed = OutboxEnvelope::new("test-delete", "category.created", "{}");
    append(store, &[keep.clone(), removed.clone()]).await;

    store
        .delete("test-delete", removed.id)
        .await
        .expect("delete should succeed");

    assert_eq!(store.fetch_pending("test-delete").await.unwrap(), vec![keep]);
}

pub async fn test_delete_is_idempotent<S: CatalogStore + OutboxStore>(store: &S) {
    let envelope = OutboxEnvelope::new("test-idempotent", "category.created", "{}");
    append(store, &[envelope.clone()]).await;

    store.delete("test-idempotent", envelope.id).await.unwrap();
    store
        .delete("test-idempotent", envelope.id)
        .await
        .expect("second delete should succeed");
    store
        .delete("test-idempotent", Uuid::now_v7())
        .await
        .expect("deleting an unknown id should succeed");

    assert!(store.fetch_pending("test-idempotent").await.unwrap().is_empty());
}

pub async fn test_delete_requires_matching_bucket<S: CatalogStore + OutboxStore>(store: &S) {
    let envelope = OutboxEnvelope::new("test-bucket-key", "category.created", "{}");
    append(store, &[envelope.clone()]).await;

    store.delete("test-bucket-other", envelope.id).await.unwrap();

    assert_eq!(
        store.fetch_pending("test-bucket-key").await.unwrap(),
        vec![envelope],
        "bucket is part of the key"
    );
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all OutboxStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_outbox_store_tests {
    ($store:expr) => {
        use $crate::storage::outbox_store_tests::*;

        test_fetch_empty_bucket($store).await;
        println!("  test_fetch_empty_bucket: PASSED");

        test_fetch_ascending_by_id($store).await;
        println!("  test_fetch_ascending_by_id: PASSED");

        test_fetch_scoped_to_bucket($store).await;
        println!("  test_fetch_scoped_to_bucket: PASSED");

        test_fetch_is_restartable($store).await;
        println!("  test_fetch_is_restartable: PASSED");

        test_delete_removes_envelope($store).await;
        println!("  test_delete_removes_envelope: PASSED");

        test_delete_is_idempotent($store).await;
        println!("  test_delete_is_idempotent: PASSED");

        test_delete_requires_matching_bucket($store).await;
        println!("  test_delete_requires_matching_bucket: PASSED");
    };
}
