//! SQLite UserRepository implementation.
//!
//! A connection is opened per call on the blocking pool; WAL mode and a busy
//! timeout let concurrent jobs share the file.

use crate::domain::jobs::UserRecord;
use crate::domain::preferences::{EncodingPreferences, PreferenceUpdate, SettingField};
use crate::ports::repository::{RepositoryError, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};

const USER_SCHEMA: &str = include_str!("../../../sql/users.sql");

const SELECT_PREFERENCES: &str = "SELECT upload_mode, resolution, vcodec, bits, crf, aspect_ratio \
     FROM user_settings WHERE user_id = ?1";

pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA temp_store = MEMORY;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}

/// Fixed statement per field; column names never come from user input.
fn update_statement(field: SettingField) -> &'static str {
    match field {
        SettingField::UploadMode => {
            "UPDATE user_settings SET upload_mode = ?1, updated_at = ?2 WHERE user_id = ?3"
        }
        SettingField::Resolution => {
            "UPDATE user_settings SET resolution = ?1, updated_at = ?2 WHERE user_id = ?3"
        }
        SettingField::Vcodec => {
            "UPDATE user_settings SET vcodec = ?1, updated_at = ?2 WHERE user_id = ?3"
        }
        SettingField::Bits => "UPDATE user_settings SET bits = ?1, updated_at = ?2 WHERE user_id = ?3",
        SettingField::Crf => "UPDATE user_settings SET crf = ?1, updated_at = ?2 WHERE user_id = ?3",
        SettingField::AspectRatio => {
            "UPDATE user_settings SET aspect_ratio = ?1, updated_at = ?2 WHERE user_id = ?3"
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Backend(format!("SQLite error: {}", err))
    }
}

#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    path: PathBuf,
}

impl SqliteUserStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.initialize()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, RepositoryError> {
        let conn = Connection::open(&self.path).map_err(|e| {
            RepositoryError::Backend(format!("opening {}: {}", self.path.display(), e))
        })?;
        configure_connection(&conn)?;
        Ok(conn)
    }

    pub fn initialize(&self) -> Result<(), RepositoryError> {
        let conn = self.open()?;
        conn.execute_batch(USER_SCHEMA)?;
        Ok(())
    }

    async fn with_connection<F, T>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = store.open()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::Backend(format!("blocking task failed: {}", e)))?
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        joined_at: row.get::<_, DateTime<Utc>>(3)?,
    })
}

fn preferences_from_row(row: &Row<'_>) -> rusqlite::Result<Vec<(&'static str, String)>> {
    SettingField::ALL
        .iter()
        .enumerate()
        .map(|(idx, field)| row.get::<_, String>(idx).map(|value| (field.key(), value)))
        .collect()
}

fn read_preferences(
    conn: &Connection,
    user_id: i64,
) -> Result<Option<EncodingPreferences>, RepositoryError> {
    let pairs = conn
        .query_row(SELECT_PREFERENCES, params![user_id], preferences_from_row)
        .optional()?;
    match pairs {
        Some(pairs) => Ok(Some(EncodingPreferences::from_pairs(pairs)?)),
        None => Ok(None),
    }
}

fn insert_defaults(conn: &Connection, user_id: i64) -> rusqlite::Result<usize> {
    let defaults = EncodingPreferences::default();
    conn.execute(
        "INSERT OR IGNORE INTO user_settings \
         (user_id, upload_mode, resolution, vcodec, bits, crf, aspect_ratio, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user_id,
            defaults.upload_mode.as_str(),
            defaults.resolution.as_str(),
            defaults.vcodec.as_str(),
            defaults.bits.as_str(),
            defaults.crf.to_string(),
            defaults.aspect_ratio.as_str(),
            Utc::now(),
        ],
    )
}

#[async_trait]
impl UserRepository for SqliteUserStore {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), RepositoryError> {
        let user = user.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, username, first_name, joined_at, is_active) \
                 VALUES (?1, ?2, ?3, ?4, 1) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 username = excluded.username, first_name = excluded.first_name, is_active = 1",
                params![user.user_id, user.username, user.first_name, user.joined_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, RepositoryError> {
        self.with_connection(move |conn| {
            let user = conn
                .query_row(
                    "SELECT user_id, username, first_name, joined_at FROM users WHERE user_id = ?1",
                    params![user_id],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn count_users(&self) -> Result<u64, RepositoryError> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, RepositoryError> {
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let users = tx.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
            let settings =
                tx.execute("DELETE FROM user_settings WHERE user_id = ?1", params![user_id])?;
            tx.commit()?;
            Ok(users + settings > 0)
        })
        .await
    }

    async fn get_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<EncodingPreferences>, RepositoryError> {
        self.with_connection(move |conn| read_preferences(conn, user_id))
            .await
    }

    async fn upsert_preferences(
        &self,
        user_id: i64,
        prefs: &EncodingPreferences,
    ) -> Result<(), RepositoryError> {
        let prefs = *prefs;
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO user_settings \
                 (user_id, upload_mode, resolution, vcodec, bits, crf, aspect_ratio, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 upload_mode = excluded.upload_mode, resolution = excluded.resolution, \
                 vcodec = excluded.vcodec, bits = excluded.bits, crf = excluded.crf, \
                 aspect_ratio = excluded.aspect_ratio, updated_at = excluded.updated_at",
                params![
                    user_id,
                    prefs.upload_mode.as_str(),
                    prefs.resolution.as_str(),
                    prefs.vcodec.as_str(),
                    prefs.bits.as_str(),
                    prefs.crf.to_string(),
                    prefs.aspect_ratio.as_str(),
                    Utc::now(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_preference(
        &self,
        user_id: i64,
        update: PreferenceUpdate,
    ) -> Result<EncodingPreferences, RepositoryError> {
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            insert_defaults(&tx, user_id)?;
            tx.execute(
                update_statement(update.field()),
                params![update.value(), Utc::now(), user_id],
            )?;
            let prefs = read_preferences(&tx, user_id)?;
            tx.commit()?;
            prefs.ok_or_else(|| {
                RepositoryError::Corrupt(format!("preferences for {user_id} vanished mid-update"))
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::{Crf, Resolution, UploadMode, VideoCodec};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SqliteUserStore) {
        let dir = tempdir().unwrap();
        let store = SqliteUserStore::new(dir.path().join("bot.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let (_dir, store) = store();
        let user = UserRecord::new(42, Some("neo".into()), "Thomas");

        store.upsert_user(&user).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);

        let loaded = store.get_user(42).await.unwrap().unwrap();
        assert_eq!(loaded.username.as_deref(), Some("neo"));
        assert_eq!(loaded.first_name, "Thomas");

        let renamed = UserRecord::new(42, None, "Mr. Anderson");
        store.upsert_user(&renamed).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);
        let loaded = store.get_user(42).await.unwrap().unwrap();
        assert_eq!(loaded.first_name, "Mr. Anderson");
        assert_eq!(loaded.joined_at, user.joined_at);

        assert!(store.delete_user(42).await.unwrap());
        assert!(!store.delete_user(42).await.unwrap());
        assert!(store.get_user(42).await.unwrap().is_none());
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_preferences_is_none() {
        let (_dir, store) = store();
        assert!(store.get_preferences(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_creates_defaults_then_sets_field() {
        let (_dir, store) = store();
        let prefs = store
            .update_preference(5, PreferenceUpdate::Vcodec(VideoCodec::X264))
            .await
            .unwrap();
        assert_eq!(prefs.vcodec, VideoCodec::X264);
        assert_eq!(
            EncodingPreferences {
                vcodec: VideoCodec::X265,
                ..prefs
            },
            EncodingPreferences::default()
        );
        assert_eq!(store.get_preferences(5).await.unwrap(), Some(prefs));
    }

    #[tokio::test]
    async fn test_successive_updates_keep_earlier_fields() {
        let (_dir, store) = store();
        store
            .update_preference(9, PreferenceUpdate::Resolution(Resolution::P720))
            .await
            .unwrap();
        let prefs = store
            .update_preference(9, PreferenceUpdate::Crf(Crf::new(24).unwrap()))
            .await
            .unwrap();
        assert_eq!(prefs.resolution, Resolution::P720);
        assert_eq!(prefs.crf.value(), 24);
    }

    #[tokio::test]
    async fn test_upsert_preferences_replaces_record() {
        let (_dir, store) = store();
        let mut prefs = EncodingPreferences::default();
        prefs.apply(PreferenceUpdate::UploadMode(UploadMode::Video));
        store.upsert_preferences(3, &prefs).await.unwrap();
        assert_eq!(store.get_preferences(3).await.unwrap(), Some(prefs));

        store
            .upsert_preferences(3, &EncodingPreferences::default())
            .await
            .unwrap();
        assert_eq!(
            store.get_preferences(3).await.unwrap(),
            Some(EncodingPreferences::default())
        );
    }

    #[tokio::test]
    async fn test_corrupt_stored_value_is_rejected() {
        let (dir, store) = store();
        store
            .upsert_preferences(4, &EncodingPreferences::default())
            .await
            .unwrap();
        let conn = Connection::open(dir.path().join("bot.db")).unwrap();
        conn.execute("UPDATE user_settings SET vcodec = 'vp9' WHERE user_id = 4", [])
            .unwrap();
        drop(conn);

        assert!(matches!(
            store.get_preferences(4).await,
            Err(RepositoryError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_updates_all_land() {
        let (_dir, store) = store();
        let a = store.update_preference(1, PreferenceUpdate::Vcodec(VideoCodec::X264));
        let b = store.update_preference(1, PreferenceUpdate::Resolution(Resolution::P480));
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        let prefs = store.get_preferences(1).await.unwrap().unwrap();
        assert_eq!(prefs.vcodec, VideoCodec::X264);
        assert_eq!(prefs.resolution, Resolution::P480);
    }
}
