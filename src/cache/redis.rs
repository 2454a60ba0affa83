//! Redis cache implementation.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info};

use super::{Cache, Result};
use crate::config::RedisCacheConfig;

/// Redis-backed cache. Keys are namespaced by the configured prefix.
pub struct RedisCache {
    conn: ConnectionManager,
    key_prefix: String,
    ttl_secs: Option<u64>,
}

impl RedisCache {
    /// Connect to the configured Redis server.
    pub async fn new(config: &RedisCacheConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %config.url, "Connected to Redis for caching");

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            ttl_secs: config.ttl_secs,
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;
        debug!(key = %key, hit = value.is_some(), "Redis cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);
        match self.ttl_secs {
            Some(ttl) => {
                let _: () = conn.set_ex(full_key, value, ttl).await?;
            }
            None => {
                let _: () = conn.set(full_key, value).await?;
            }
        }
        Ok(())
    }
}
