//! Read-through cache configuration types.

use serde::Deserialize;

/// Cache type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Reads always go to storage.
    #[default]
    None,
    /// Process-local map.
    Memory,
    /// Redis.
    Redis,
}

/// Cache configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache type discriminator.
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    /// Redis-specific configuration.
    pub redis: RedisCacheConfig,
}

/// Redis-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    pub url: String,
    /// Prefix for every cache key.
    pub key_prefix: String,
    /// Expiry applied on set. `None` leaves eviction to the server policy.
    pub ttl_secs: Option<u64>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "catalog".to_string(),
            ttl_secs: None,
        }
    }
}
