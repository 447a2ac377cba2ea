use crate::domain::jobs::RemoteFile;
use crate::ports::chat::ChatError;
use async_trait::async_trait;
use std::path::Path;

/// Inbound file transfer from the chat platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferPort: Send + Sync {
    /// Fetch `file` into `dest`, returning the number of bytes written.
    async fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64, ChatError>;

    /// Release any session the transport holds. Called once at shutdown.
    async fn shutdown(&self) {}
}
