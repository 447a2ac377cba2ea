//! User registration and preference commands.

use crate::domain::av::progress::format_file_size;
use crate::domain::jobs::UserRecord;
use crate::domain::preferences::{EncodingPreferences, PreferenceUpdate, SettingField};
use crate::ports::repository::{RepositoryError, UserRepository};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetCommandError {
    #[error("usage: /set <field> <value>")]
    Usage,
    #[error("unknown setting {0:?}")]
    UnknownField(String),
    #[error("{value:?} is not a valid {field}, expected one of: {accepted}")]
    InvalidValue {
        field: SettingField,
        value: String,
        accepted: &'static str,
    },
}

/// Parse the argument text of `/set`, e.g. `crf 28`.
pub fn parse_set_command(args: &str) -> Result<PreferenceUpdate, SetCommandError> {
    let mut parts = args.split_whitespace();
    let (Some(field), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(SetCommandError::Usage);
    };
    let field: SettingField = field
        .parse()
        .map_err(SetCommandError::UnknownField)?;
    PreferenceUpdate::parse(field, value).map_err(|e| SetCommandError::InvalidValue {
        field,
        value: e.value,
        accepted: field.accepted_values(),
    })
}

pub fn render_settings(prefs: &EncodingPreferences) -> String {
    let resolution = match prefs.resolution.dimensions() {
        Some((w, h)) => format!("{}p ({w}x{h})", prefs.resolution),
        None => "original".to_string(),
    };
    format!(
        "⚙️ Your encoding settings\n\n\
         📤 Upload mode: {}\n\
         📐 Resolution: {}\n\
         🎞 Codec: {}\n\
         🎨 Bit depth: {}-bit\n\
         🎚 CRF: {}\n\
         🖼 Aspect ratio: {}\n\n\
         Change one with /set <field> <value>, e.g. /set crf 28",
        prefs.upload_mode, resolution, prefs.vcodec, prefs.bits, prefs.crf, prefs.aspect_ratio
    )
}

/// Read the stored preferences, writing defaults on first use.
pub async fn load_or_create_preferences<R>(
    repo: &R,
    user_id: i64,
) -> Result<EncodingPreferences, RepositoryError>
where
    R: UserRepository + ?Sized,
{
    if let Some(prefs) = repo.get_preferences(user_id).await? {
        return Ok(prefs);
    }
    let prefs = EncodingPreferences::default();
    repo.upsert_preferences(user_id, &prefs).await?;
    Ok(prefs)
}

const STORAGE_FAILURE: &str = "❌ Could not reach settings storage. Please try again later.";

pub struct SettingsService<R: ?Sized> {
    repo: Arc<R>,
    max_file_size: u64,
    upload_limit: u64,
}

impl<R: UserRepository + ?Sized> SettingsService<R> {
    pub fn new(repo: Arc<R>, max_file_size: u64, upload_limit: u64) -> Self {
        Self {
            repo,
            max_file_size,
            upload_limit,
        }
    }

    /// `/start`: register the user and greet them.
    pub async fn register(&self, user: &UserRecord) -> String {
        if let Err(e) = self.repo.upsert_user(user).await {
            error!(error = %e, user_id = user.user_id, "failed to register user");
            return STORAGE_FAILURE.to_string();
        }
        if let Err(e) = load_or_create_preferences(self.repo.as_ref(), user.user_id).await {
            warn!(error = %e, user_id = user.user_id, "failed to create default preferences");
        }
        info!(user_id = user.user_id, "user registered");
        format!(
            "👋 Hi {}!\n\nSend me a video or a video file and I will re-encode it with your \
             settings.\n\nUse /settings to see them and /help for everything else.",
            user.first_name
        )
    }

    pub fn help_text(&self) -> String {
        format!(
            "🎬 How it works\n\n\
             1. Send a video or a video file (up to {}).\n\
             2. I download it, re-encode it with your settings and show live progress.\n\
             3. You get the result back (up to {}).\n\n\
             Commands\n\
             /settings - show your settings\n\
             /set <field> <value> - change one setting\n\
             /reset - restore the defaults\n\
             /delete - forget your account\n\n\
             Fields\n\
             upload_mode: {}\n\
             resolution: {}\n\
             vcodec: {}\n\
             bits: {}\n\
             crf: {} (lower is better quality, bigger file)\n\
             aspect_ratio: {}",
            format_file_size(self.max_file_size),
            format_file_size(self.upload_limit),
            SettingField::UploadMode.accepted_values(),
            SettingField::Resolution.accepted_values(),
            SettingField::Vcodec.accepted_values(),
            SettingField::Bits.accepted_values(),
            SettingField::Crf.accepted_values(),
            SettingField::AspectRatio.accepted_values(),
        )
    }

    /// `/settings`
    pub async fn describe(&self, user_id: i64) -> String {
        match load_or_create_preferences(self.repo.as_ref(), user_id).await {
            Ok(prefs) => render_settings(&prefs),
            Err(e) => {
                error!(error = %e, user_id, "failed to load preferences");
                STORAGE_FAILURE.to_string()
            }
        }
    }

    /// `/set <field> <value>`
    pub async fn apply_command(&self, user_id: i64, args: &str) -> String {
        let update = match parse_set_command(args) {
            Ok(update) => update,
            Err(e) => return format!("⚠️ {e}"),
        };
        match self.repo.update_preference(user_id, update).await {
            Ok(prefs) => {
                info!(user_id, field = %update.field(), value = %update.value(), "preference updated");
                format!(
                    "✅ {} set to {}\n\n{}",
                    update.field(),
                    update.value(),
                    render_settings(&prefs)
                )
            }
            Err(e) => {
                error!(error = %e, user_id, "failed to update preference");
                STORAGE_FAILURE.to_string()
            }
        }
    }

    /// `/reset`
    pub async fn reset(&self, user_id: i64) -> String {
        let defaults = EncodingPreferences::default();
        match self.repo.upsert_preferences(user_id, &defaults).await {
            Ok(()) => format!("♻️ Settings restored to defaults.\n\n{}", render_settings(&defaults)),
            Err(e) => {
                error!(error = %e, user_id, "failed to reset preferences");
                STORAGE_FAILURE.to_string()
            }
        }
    }

    /// `/delete`
    pub async fn forget(&self, user_id: i64) -> String {
        match self.repo.delete_user(user_id).await {
            Ok(true) => {
                info!(user_id, "user deleted");
                "🗑 Your account and settings were deleted. Send /start to register again."
                    .to_string()
            }
            Ok(false) => "Nothing to delete, you are not registered.".to_string(),
            Err(e) => {
                error!(error = %e, user_id, "failed to delete user");
                STORAGE_FAILURE.to_string()
            }
        }
    }

    /// Registered user count, for the startup log.
    pub async fn user_count(&self) -> Result<u64, RepositoryError> {
        self.repo.count_users().await
    }
}
