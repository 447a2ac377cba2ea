//! Local adapters: filesystem workspaces and user storage backends.

pub mod fs;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "redis")]
pub use redis::RedisPool;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteUserStore;
