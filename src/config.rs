//! Environment configuration.

use crate::application::acquisition::TransferLimits;
use crate::application::orchestrator::EncoderSettings;
use crate::domain::av::progress::MIN_UPDATE_INTERVAL;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var required")]
    Missing(&'static str),
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("STANDARD_TRANSFER_LIMIT ({standard} MB) must be below MAX_FILE_SIZE ({max} MB)")]
    InvertedLimits { standard: u64, max: u64 },
}

/// Bot configuration. Sizes are read in megabytes and stored in bytes.
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub bot_token: String,
    /// Self-hosted Bot API server; enables the large-file transport.
    pub local_api_url: Option<Url>,
    pub temp_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub max_file_size: u64,
    pub standard_transfer_limit: u64,
    pub max_upload_size: u64,
    pub download_timeout: Duration,
    pub encoding_timeout: Duration,
    pub upload_timeout: Duration,
    pub progress_interval: Duration,
    pub max_concurrent_jobs: usize,
    /// When set and reachable, users are stored in Redis instead of SQLite.
    pub redis_url: Option<String>,
    pub database_path: PathBuf,
    pub stale_file_age: Duration,
}

impl BotConfig {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bot_token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let local_api_url = match var("LOCAL_BOT_API_URL") {
            Some(raw) => Some(Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid {
                name: "LOCAL_BOT_API_URL",
                value: raw,
                expected: "an absolute URL",
            })?),
            None => None,
        };

        let max_file_size = number(&var, "MAX_FILE_SIZE", 2000)?;
        let standard_transfer_limit = number(&var, "STANDARD_TRANSFER_LIMIT", 20)?;
        if standard_transfer_limit >= max_file_size {
            return Err(ConfigError::InvertedLimits {
                standard: standard_transfer_limit,
                max: max_file_size,
            });
        }

        let max_concurrent_jobs = number(&var, "MAX_CONCURRENT_JOBS", 2)?;
        if max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_JOBS",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }

        Ok(Self {
            bot_token,
            local_api_url,
            temp_dir: var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("encodebot")),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".into()).into(),
            ffprobe_path: var("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".into()).into(),
            max_file_size: scale("MAX_FILE_SIZE", max_file_size, MB)?,
            standard_transfer_limit: scale("STANDARD_TRANSFER_LIMIT", standard_transfer_limit, MB)?,
            max_upload_size: scale("MAX_UPLOAD_SIZE", number(&var, "MAX_UPLOAD_SIZE", 50)?, MB)?,
            download_timeout: Duration::from_secs(number(&var, "DOWNLOAD_TIMEOUT", 300)?),
            encoding_timeout: Duration::from_secs(number(&var, "ENCODING_TIMEOUT", 1800)?),
            upload_timeout: Duration::from_secs(number(&var, "UPLOAD_TIMEOUT", 600)?),
            progress_interval: Duration::from_secs(number(&var, "PROGRESS_UPDATE_INTERVAL", 5)?)
                .max(MIN_UPDATE_INTERVAL),
            max_concurrent_jobs: max_concurrent_jobs as usize,
            redis_url: var("REDIS_URL"),
            database_path: var("DATABASE_PATH")
                .unwrap_or_else(|| "encodebot.db".into())
                .into(),
            stale_file_age: Duration::from_secs(scale(
                "STALE_FILE_HOURS",
                number(&var, "STALE_FILE_HOURS", 24)?,
                3600,
            )?),
        })
    }

    pub fn transfer_limits(&self) -> TransferLimits {
        TransferLimits {
            max_file_size: self.max_file_size,
            standard_limit: self.standard_transfer_limit,
            timeout: self.download_timeout,
        }
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            ffmpeg: self.ffmpeg_path.clone(),
            timeout: self.encoding_timeout,
            progress_interval: self.progress_interval,
        }
    }
}

fn number<F>(var: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
            expected: "a non-negative integer",
        }),
    }
}

/// Convert a configured count into base units, rejecting values that overflow.
fn scale(name: &'static str, value: u64, unit: u64) -> Result<u64, ConfigError> {
    value.checked_mul(unit).ok_or_else(|| ConfigError::Invalid {
        name,
        value: value.to_string(),
        expected: "a value small enough to fit in 64 bits once converted",
    })
}
