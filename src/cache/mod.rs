//! Read-through cache for point lookups.
//!
//! The cache holds serialized entities under `category:{id}` and
//! `product:{categoryId}:{productId}`. Eviction is left to the backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{CacheConfig, CacheType};

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Key for a cached category.
pub fn category_key(id: u64) -> String {
    format!("category:{}", id)
}

/// Key for a cached product.
pub fn product_key(category_id: u64, product_id: u64) -> String {
    format!("product:{}:{}", category_id, product_id)
}

/// Byte-valued key/value cache.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
}

/// Process-local cache backed by a map.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail: RwLock<bool>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail, for exercising degraded paths.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn check(&self) -> Result<()> {
        if *self.fail.read().await {
            return Err(CacheError::Unavailable("in-memory cache disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check().await?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check().await?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Initialize the cache based on configuration. `None` disables caching.
pub async fn init_cache(
    config: &CacheConfig,
) -> std::result::Result<Option<Arc<dyn Cache>>, Box<dyn std::error::Error>> {
    match config.cache_type {
        CacheType::None => Ok(None),
        CacheType::Memory => {
            info!(cache_type = "memory", "Cache initialized");
            Ok(Some(Arc::new(InMemoryCache::new())))
        }
        CacheType::Redis => {
            #[cfg(feature = "redis")]
            {
                let cache = RedisCache::new(&config.redis).await?;
                info!(cache_type = "redis", "Cache initialized");
                Ok(Some(Arc::new(cache)))
            }

            #[cfg(not(feature = "redis"))]
            {
                Err("Redis support requires the 'redis' feature. Rebuild with --features redis".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(category_key(7), "category:7");
        assert_eq!(product_key(7, 99), "product:7:99");
    }

    #[tokio::test]
    async fn test_in_memory_get_set() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_in_memory_failure_toggle() {
        let cache = InMemoryCache::new();
        cache.set_fail(true).await;
        assert!(cache.get("k").await.is_err());
        assert!(cache.set("k", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_init_cache_none_by_default() {
        assert!(init_cache(&CacheConfig::default()).await.unwrap().is_none());

        let config = CacheConfig {
            cache_type: CacheType::Memory,
            ..CacheConfig::default()
        };
        assert!(init_cache(&config).await.unwrap().is_some());
    }
}
