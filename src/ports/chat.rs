use crate::domain::jobs::MessageRef;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The platform refused the file because of its size.
    #[error("file rejected as too large: {0}")]
    TooLarge(String),
    /// The transport itself could not be reached or initialised.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("chat request failed: {0}")]
    Request(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound messaging: status messages, edits and result uploads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Send a new text message and return a handle to edit it later.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, ChatError>;

    /// Replace the text of a previously sent message.
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), ChatError>;

    /// Upload as a streamable video.
    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str)
        -> Result<(), ChatError>;

    /// Upload as a generic file.
    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<(), ChatError>;
}
