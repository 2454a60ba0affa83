//! Shared storage integration tests.
//!
//! Tests the CatalogStore and OutboxStore interfaces against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod catalog_store_tests;
pub mod outbox_store_tests;
