use super::classify_request_error;
use crate::domain::jobs::MessageRef;
use crate::ports::chat::{ChatError, ChatPort};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::{ApiError, RequestError};

#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatPort for TelegramChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, ChatError> {
        let message = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(classify_request_error)?;
        Ok(MessageRef {
            chat_id,
            message_id: message.id.0,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), ChatError> {
        match self
            .bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await
        {
            Ok(_) => Ok(()),
            // Re-sending identical text is not a failure.
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(classify_request_error(e)),
        }
    }

    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> Result<(), ChatError> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path))
            .caption(caption)
            .supports_streaming(true)
            .await
            .map_err(classify_request_error)?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<(), ChatError> {
        self.bot
            .send_document(ChatId(chat_id), InputFile::file(path))
            .caption(caption)
            .await
            .map_err(classify_request_error)?;
        Ok(())
    }
}
