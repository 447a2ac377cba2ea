use crate::domain::jobs::UserRecord;
use crate::domain::preferences::{EncodingPreferences, InvalidSetting, PreferenceUpdate};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Invalid(#[from] InvalidSetting),
}

/// Registered users and their encoding preferences.
///
/// Every write is atomic per user and the last write wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or refresh the profile fields of a user.
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), RepositoryError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, RepositoryError>;

    async fn count_users(&self) -> Result<u64, RepositoryError>;

    /// Remove the profile and preferences. Returns whether anything existed.
    async fn delete_user(&self, user_id: i64) -> Result<bool, RepositoryError>;

    async fn get_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<EncodingPreferences>, RepositoryError>;

    /// Replace the whole preference record.
    async fn upsert_preferences(
        &self,
        user_id: i64,
        prefs: &EncodingPreferences,
    ) -> Result<(), RepositoryError>;

    /// Change one field, creating a default record first when none exists.
    async fn update_preference(
        &self,
        user_id: i64,
        update: PreferenceUpdate,
    ) -> Result<EncodingPreferences, RepositoryError>;
}
