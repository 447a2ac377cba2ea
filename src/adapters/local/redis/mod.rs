//! Redis adapter.
//!
//! Provides a Redis-backed `UserRepository`: one hash per user profile, one
//! hash per preference record, and a set of known user ids for counting.

mod error;
mod pool;
mod repository;

pub use pool::RedisPool;

/// Redis key constants
const USER_PREFIX: &str = "encodebot:user:";
const PREFS_PREFIX: &str = "encodebot:prefs:";
const USERS_SET: &str = "encodebot:users";

fn user_key(user_id: i64) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

fn prefs_key(user_id: i64) -> String {
    format!("{}{}", PREFS_PREFIX, user_id)
}
