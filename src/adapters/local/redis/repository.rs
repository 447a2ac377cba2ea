//! Redis UserRepository implementation.

use super::pool::RedisPool;
use super::{prefs_key, user_key, USERS_SET};
use crate::domain::jobs::UserRecord;
use crate::domain::preferences::{EncodingPreferences, PreferenceUpdate};
use crate::ports::repository::{RepositoryError, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::redis::{self, AsyncCommands};
use std::collections::HashMap;

fn user_from_hash(user_id: i64, fields: &HashMap<String, String>) -> Result<UserRecord, RepositoryError> {
    let joined_at = fields
        .get("joined_at")
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RepositoryError::Corrupt(format!("joined_at {raw:?}: {e}")))
        })
        .transpose()?
        .unwrap_or_else(Utc::now);

    Ok(UserRecord {
        user_id,
        username: fields.get("username").filter(|u| !u.is_empty()).cloned(),
        first_name: fields.get("first_name").cloned().unwrap_or_default(),
        joined_at,
    })
}

#[async_trait]
impl UserRepository for RedisPool {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get().await?;
        let key = user_key(user.user_id);
        let profile = [
            ("username", user.username.clone().unwrap_or_default()),
            ("first_name", user.first_name.clone()),
        ];

        // joined_at is only written the first time a user is seen.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(&key, &profile)
            .ignore()
            .hset_nx(&key, "joined_at", user.joined_at.to_rfc3339())
            .ignore()
            .sadd(USERS_SET, user.user_id)
            .ignore();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, RepositoryError> {
        let mut conn = self.pool.get().await?;
        let fields: HashMap<String, String> = conn.hgetall(user_key(user_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        user_from_hash(user_id, &fields).map(Some)
    }

    async fn count_users(&self) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.get().await?;
        let count: u64 = conn.scard(USERS_SET).await?;
        Ok(count)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&[user_key(user_id), prefs_key(user_id)])
            .srem(USERS_SET, user_id);
        let (deleted_keys, removed_member): (u64, u64) = pipe.query_async(&mut conn).await?;
        Ok(deleted_keys > 0 || removed_member > 0)
    }

    async fn get_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<EncodingPreferences>, RepositoryError> {
        let mut conn = self.pool.get().await?;
        let fields: HashMap<String, String> = conn.hgetall(prefs_key(user_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(EncodingPreferences::from_pairs(fields)?))
    }

    async fn upsert_preferences(
        &self,
        user_id: i64,
        prefs: &EncodingPreferences,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get().await?;
        let () = conn.hset_multiple(prefs_key(user_id), &prefs.to_pairs()).await?;
        Ok(())
    }

    async fn update_preference(
        &self,
        user_id: i64,
        update: PreferenceUpdate,
    ) -> Result<EncodingPreferences, RepositoryError> {
        let mut conn = self.pool.get().await?;
        let key = prefs_key(user_id);

        // Fill missing fields with defaults, then set the one field, in one transaction.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, value) in EncodingPreferences::default().to_pairs() {
            pipe.hset_nx(&key, field, value).ignore();
        }
        pipe.hset(&key, update.field().key(), update.value())
            .ignore()
            .hgetall(&key);
        let (fields,): (HashMap<String, String>,) = pipe.query_async(&mut conn).await?;
        Ok(EncodingPreferences::from_pairs(fields)?)
    }
}
