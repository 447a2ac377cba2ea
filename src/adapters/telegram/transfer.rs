use super::classify_request_error;
use crate::domain::jobs::RemoteFile;
use crate::ports::chat::ChatError;
use crate::ports::transfer::TransferPort;
use async_trait::async_trait;
use std::path::Path;
use teloxide::net::Download;
use teloxide::prelude::*;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

enum Backend {
    /// Public Bot API, subject to its download ceiling.
    Standard(Bot),
    /// Self-hosted Bot API server. The client is created and verified on
    /// first use.
    LocalApi {
        token: String,
        api_url: Url,
        client: Mutex<Option<Bot>>,
    },
}

pub struct TelegramTransfer {
    backend: Backend,
}

impl TelegramTransfer {
    pub fn standard(bot: Bot) -> Self {
        Self {
            backend: Backend::Standard(bot),
        }
    }

    pub fn local_api(token: impl Into<String>, api_url: Url) -> Self {
        Self {
            backend: Backend::LocalApi {
                token: token.into(),
                api_url,
                client: Mutex::new(None),
            },
        }
    }

    async fn client(&self) -> Result<Bot, ChatError> {
        match &self.backend {
            Backend::Standard(bot) => Ok(bot.clone()),
            Backend::LocalApi {
                token,
                api_url,
                client,
            } => {
                let mut slot = client.lock().await;
                if let Some(bot) = slot.as_ref() {
                    return Ok(bot.clone());
                }
                let bot = Bot::new(token.clone()).set_api_url(api_url.clone());
                bot.get_me()
                    .await
                    .map_err(|e| ChatError::Unavailable(format!("{}: {}", api_url, e)))?;
                info!(api_url = %api_url, "large-file client connected");
                *slot = Some(bot.clone());
                Ok(bot)
            }
        }
    }
}

#[async_trait]
impl TransferPort for TelegramTransfer {
    async fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64, ChatError> {
        let bot = self.client().await?;
        let remote = bot
            .get_file(file.file_id.clone())
            .await
            .map_err(classify_request_error)?;

        // A self-hosted server running with --local returns an absolute path
        // on a shared filesystem instead of serving the file over HTTP.
        let local_path = Path::new(&remote.path);
        if matches!(self.backend, Backend::LocalApi { .. })
            && local_path.is_absolute()
            && tokio::fs::try_exists(local_path).await.unwrap_or(false)
        {
            debug!(from = %local_path.display(), "copying file from shared bot api storage");
            return Ok(tokio::fs::copy(local_path, dest).await?);
        }

        let mut out = tokio::fs::File::create(dest).await?;
        bot.download_file(&remote.path, &mut out)
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;
        out.flush().await?;
        Ok(tokio::fs::metadata(dest).await?.len())
    }

    async fn shutdown(&self) {
        if let Backend::LocalApi { client, .. } = &self.backend {
            if client.lock().await.take().is_some() {
                info!("large-file client released");
            }
        }
    }
}
