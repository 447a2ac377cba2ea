//! Encodebot binary
//!
//! Wires up:
//! - Telegram adapters (chat, standard and large-file transfers)
//! - ffmpeg encoder adapter
//! - User store (Redis when reachable, SQLite otherwise)
//! - Stale temp-file sweeper
//!
//! Environment variables are documented on `BotConfig`.

use encodebot::adapters::ffmpeg::FfmpegEncoder;
use encodebot::adapters::local::fs::spawn_sweeper;
use encodebot::adapters::telegram::{dispatch, TelegramChat, TelegramTransfer};
use encodebot::application::acquisition::MediaAcquisition;
use encodebot::application::delivery::ResultDelivery;
use encodebot::application::orchestrator::EncodeOrchestrator;
use encodebot::application::pipeline::EncodeJobService;
use encodebot::application::settings::SettingsService;
use encodebot::ports::repository::UserRepository;
use encodebot::BotConfig;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SWEEP_EVERY: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = BotConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,teloxide=warn,hyper=warn")),
        )
        .init();

    tokio::fs::create_dir_all(&config.temp_dir).await?;

    // 1. Adapters
    let bot = Bot::new(&config.bot_token);
    let chat = Arc::new(TelegramChat::new(bot.clone()));
    let standard = TelegramTransfer::standard(bot.clone());
    let large_file = config
        .local_api_url
        .clone()
        .map(|url| TelegramTransfer::local_api(config.bot_token.clone(), url));
    if large_file.is_none() {
        warn!(
            limit = config.standard_transfer_limit,
            "LOCAL_BOT_API_URL not set, files above the standard limit go through the standard transport and fail if it rejects them"
        );
    }
    let repo = open_repository(&config).await?;

    // 2. Application services
    let jobs = Arc::new(EncodeJobService::new(
        chat.clone(),
        repo.clone(),
        MediaAcquisition::new(chat.clone(), standard, large_file, config.transfer_limits()),
        EncodeOrchestrator::new(
            chat.clone(),
            FfmpegEncoder::new(&config.ffprobe_path),
            config.encoder_settings(),
        ),
        ResultDelivery::new(chat, config.max_upload_size, config.upload_timeout),
        config.temp_dir.clone(),
        config.max_concurrent_jobs,
    ));
    let settings = Arc::new(SettingsService::new(
        repo,
        config.max_file_size,
        config.max_upload_size,
    ));

    // 3. Background sweeper
    let sweeper = spawn_sweeper(config.temp_dir.clone(), config.stale_file_age, SWEEP_EVERY);

    match settings.user_count().await {
        Ok(users) => info!(users, "user store ready"),
        Err(e) => warn!(error = %e, "could not count users"),
    }
    info!(
        temp_dir = %config.temp_dir.display(),
        max_jobs = config.max_concurrent_jobs,
        large_file = config.local_api_url.is_some(),
        "encodebot started"
    );

    // 4. Dispatch until ctrl-c
    dispatch::run(bot, jobs.clone(), settings).await;

    sweeper.abort();
    jobs.shutdown().await;
    info!("encodebot stopped");
    Ok(())
}

#[cfg(feature = "redis")]
async fn open_redis(url: &str) -> Option<Arc<dyn UserRepository>> {
    use encodebot::adapters::local::RedisPool;

    let pool = match RedisPool::new(url) {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "invalid REDIS_URL");
            return None;
        }
    };
    match pool.ping().await {
        Ok(()) => {
            info!("using Redis user store");
            Some(Arc::new(pool))
        }
        Err(e) => {
            warn!(error = %e, "Redis unreachable");
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_url: &str) -> Option<Arc<dyn UserRepository>> {
    warn!("REDIS_URL is set but the redis feature is disabled");
    None
}

async fn open_repository(
    config: &BotConfig,
) -> Result<Arc<dyn UserRepository>, Box<dyn Error + Send + Sync>> {
    if let Some(url) = config.redis_url.as_deref() {
        if let Some(repo) = open_redis(url).await {
            return Ok(repo);
        }
    }
    open_sqlite(config)
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &BotConfig) -> Result<Arc<dyn UserRepository>, Box<dyn Error + Send + Sync>> {
    use encodebot::adapters::local::SqliteUserStore;

    let store = SqliteUserStore::new(&config.database_path)?;
    info!(path = %config.database_path.display(), "using SQLite user store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &BotConfig) -> Result<Arc<dyn UserRepository>, Box<dyn Error + Send + Sync>> {
    Err("no reachable Redis and the sqlite feature is disabled".into())
}
