//! Redis connection pool.

use crate::ports::repository::RepositoryError;
use deadpool_redis::{Config, Pool, Runtime};

/// Redis-backed adapter for repository operations.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
}

impl RedisPool {
    /// Create a new RedisPool. No connection is made until first use.
    pub fn new(redis_url: &str) -> Result<Self, RepositoryError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    /// Round-trip a PING to check the server is reachable.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get().await?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
