use super::error::DeliveryError;
use crate::domain::preferences::UploadMode;
use crate::ports::chat::{ChatError, ChatPort};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Uploads the encoded file in the user's chosen mode.
pub struct ResultDelivery<C: ?Sized> {
    chat: Arc<C>,
    upload_limit: u64,
    timeout: Duration,
}

impl<C: ChatPort + ?Sized> ResultDelivery<C> {
    pub fn new(chat: Arc<C>, upload_limit: u64, timeout: Duration) -> Self {
        Self {
            chat,
            upload_limit,
            timeout,
        }
    }

    /// Returns the uploaded size. Files above the upload ceiling are refused
    /// before any bytes are sent.
    pub async fn deliver(
        &self,
        chat_id: i64,
        path: &Path,
        mode: UploadMode,
        caption: &str,
    ) -> Result<u64, DeliveryError> {
        let size = tokio::fs::metadata(path).await?.len();
        if size > self.upload_limit {
            return Err(DeliveryError::TooLarge {
                size,
                limit: self.upload_limit,
            });
        }

        let upload = async {
            match mode {
                UploadMode::Video => self.chat.send_video(chat_id, path, caption).await,
                UploadMode::Document => self.chat.send_document(chat_id, path, caption).await,
            }
        };

        match tokio::time::timeout(self.timeout, upload).await {
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
            Ok(Err(ChatError::TooLarge(_))) => Err(DeliveryError::TooLarge {
                size,
                limit: self.upload_limit,
            }),
            Ok(Err(e)) => Err(DeliveryError::Transfer(e)),
            Ok(Ok(())) => {
                info!(chat_id, size, mode = mode.as_str(), "upload complete");
                Ok(size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chat::MockChatPort;
    use tempfile::tempdir;

    fn output(dir: &Path, bytes: usize) -> std::path::PathBuf {
        let path = dir.join("encoded.mp4");
        std::fs::write(&path, vec![0u8; bytes]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_document_mode_sends_document() {
        let dir = tempdir().unwrap();
        let path = output(dir.path(), 100);
        let mut chat = MockChatPort::new();
        chat.expect_send_document()
            .withf(|chat_id, _, caption| *chat_id == 9 && caption.contains("Encoded"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        chat.expect_send_video().never();

        let delivery = ResultDelivery::new(Arc::new(chat), 1000, Duration::from_secs(5));
        let size = delivery
            .deliver(9, &path, UploadMode::Document, "✅ Encoded successfully!")
            .await
            .unwrap();
        assert_eq!(size, 100);
    }

    #[tokio::test]
    async fn test_video_mode_sends_video() {
        let dir = tempdir().unwrap();
        let path = output(dir.path(), 10);
        let mut chat = MockChatPort::new();
        chat.expect_send_video().times(1).returning(|_, _, _| Ok(()));
        chat.expect_send_document().never();

        let delivery = ResultDelivery::new(Arc::new(chat), 1000, Duration::from_secs(5));
        delivery
            .deliver(1, &path, UploadMode::Video, "caption")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_oversized_output_is_refused_without_upload() {
        let dir = tempdir().unwrap();
        let path = output(dir.path(), 2048);
        let mut chat = MockChatPort::new();
        chat.expect_send_video().never();
        chat.expect_send_document().never();

        let delivery = ResultDelivery::new(Arc::new(chat), 1024, Duration::from_secs(5));
        let err = delivery
            .deliver(1, &path, UploadMode::Document, "caption")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::TooLarge { size: 2048, limit: 1024 }));
    }

    #[tokio::test]
    async fn test_platform_rejection_maps_to_too_large() {
        let dir = tempdir().unwrap();
        let path = output(dir.path(), 10);
        let mut chat = MockChatPort::new();
        chat.expect_send_document()
            .returning(|_, _, _| Err(ChatError::TooLarge("Request Entity Too Large".into())));

        let delivery = ResultDelivery::new(Arc::new(chat), 1024, Duration::from_secs(5));
        let err = delivery
            .deliver(1, &path, UploadMode::Document, "caption")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::TooLarge { .. }));
    }
}
