//! Size-aware download policy over two transports.

use super::error::AcquireError;
use super::reporter::update_status;
use crate::domain::av::progress::{format_duration, format_file_size, format_throughput};
use crate::domain::jobs::{MessageRef, RemoteFile, Transport};
use crate::ports::chat::{ChatError, ChatPort};
use crate::ports::transfer::TransferPort;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// Hard cap; anything above is refused before any transfer.
    pub max_file_size: u64,
    /// Ceiling of the standard transport.
    pub standard_limit: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    pub transport: Transport,
    pub elapsed: Duration,
}

pub struct MediaAcquisition<C: ?Sized, T> {
    chat: Arc<C>,
    standard: T,
    large_file: Option<T>,
    limits: TransferLimits,
}

impl<C, T> MediaAcquisition<C, T>
where
    C: ChatPort + ?Sized,
    T: TransferPort,
{
    pub fn new(chat: Arc<C>, standard: T, large_file: Option<T>, limits: TransferLimits) -> Self {
        Self {
            chat,
            standard,
            large_file,
            limits,
        }
    }

    /// Standard up to its ceiling; above it the large-file transport when configured.
    pub fn select_transport(&self, size: u64) -> Transport {
        if size > self.limits.standard_limit && self.large_file.is_some() {
            Transport::LargeFile
        } else {
            Transport::Standard
        }
    }

    pub async fn shutdown(&self) {
        self.standard.shutdown().await;
        if let Some(large_file) = &self.large_file {
            large_file.shutdown().await;
        }
    }

    /// Fetch `file` into `dest`, keeping `status` up to date.
    pub async fn acquire(
        &self,
        status: MessageRef,
        file: &RemoteFile,
        dest: &Path,
    ) -> Result<DownloadedFile, AcquireError> {
        update_status(
            self.chat.as_ref(),
            status,
            &format!("🔍 Checking file size… {}", format_file_size(file.size)),
        )
        .await;

        if file.size > self.limits.max_file_size {
            return Err(AcquireError::TooLarge {
                size: file.size,
                limit: self.limits.max_file_size,
            });
        }

        let started = Instant::now();
        let mut transport = self.select_transport(file.size);
        update_status(
            self.chat.as_ref(),
            status,
            &format!(
                "📥 Downloading {} via the {} transport…",
                format_file_size(file.size),
                transport.label()
            ),
        )
        .await;

        let size = match (&self.large_file, transport) {
            (Some(large_file), Transport::LargeFile) => {
                match self.fetch(large_file, file, dest).await {
                    Ok(size) => size,
                    Err(e) => {
                        warn!(error = %e, file_id = %file.file_id, "large-file transport failed, trying standard");
                        remove_partial(dest).await;
                        transport = Transport::Standard;
                        self.fetch_standard(file, dest).await?
                    }
                }
            }
            _ => self.fetch_standard(file, dest).await?,
        };

        if size == 0 {
            return Err(AcquireError::Empty);
        }

        let elapsed = started.elapsed();
        info!(
            file_id = %file.file_id,
            size,
            transport = transport.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "download complete"
        );
        update_status(
            self.chat.as_ref(),
            status,
            &format!(
                "✅ Downloaded {} in {} ({})",
                format_file_size(size),
                format_duration(elapsed.as_secs()),
                format_throughput(size, elapsed)
            ),
        )
        .await;

        Ok(DownloadedFile {
            path: dest.to_path_buf(),
            size,
            transport,
            elapsed,
        })
    }

    async fn fetch_standard(&self, file: &RemoteFile, dest: &Path) -> Result<u64, AcquireError> {
        match self.fetch(&self.standard, file, dest).await {
            Err(AcquireError::Transfer(ChatError::TooLarge(reason)))
                if file.size > self.limits.standard_limit =>
            {
                warn!(%reason, size = file.size, "standard transport refused oversized file");
                remove_partial(dest).await;
                Err(AcquireError::TransportUnavailable {
                    size: file.size,
                    limit: self.limits.standard_limit,
                })
            }
            other => other,
        }
    }

    async fn fetch(&self, transport: &T, file: &RemoteFile, dest: &Path) -> Result<u64, AcquireError> {
        match tokio::time::timeout(self.limits.timeout, transport.download(file, dest)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AcquireError::Timeout(self.limits.timeout)),
        }
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial download");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chat::MockChatPort;
    use crate::ports::transfer::MockTransferPort;
    use tempfile::tempdir;

    const MB: u64 = 1024 * 1024;

    fn limits() -> TransferLimits {
        TransferLimits {
            max_file_size: 2000 * MB,
            standard_limit: 20 * MB,
            timeout: Duration::from_secs(5),
        }
    }

    fn quiet_chat() -> Arc<MockChatPort> {
        let mut chat = MockChatPort::new();
        chat.expect_edit_text().returning(|_, _| Ok(()));
        Arc::new(chat)
    }

    fn remote(size: u64) -> RemoteFile {
        RemoteFile {
            file_id: "file-1".into(),
            file_name: Some("clip.mp4".into()),
            size,
        }
    }

    fn writing_transport(times: usize, payload: &'static [u8]) -> MockTransferPort {
        let mut transport = MockTransferPort::new();
        transport
            .expect_download()
            .times(times)
            .returning(move |_, dest| {
                std::fs::write(dest, payload)?;
                Ok(payload.len() as u64)
            });
        transport
    }

    fn unused_transport() -> MockTransferPort {
        let mut transport = MockTransferPort::new();
        transport.expect_download().never();
        transport
    }

    const STATUS: MessageRef = MessageRef {
        chat_id: 1,
        message_id: 2,
    };

    #[tokio::test]
    async fn test_small_file_uses_standard() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("in.mp4");
        let acquisition = MediaAcquisition::new(
            quiet_chat(),
            writing_transport(1, b"video"),
            Some(unused_transport()),
            limits(),
        );

        let file = acquisition.acquire(STATUS, &remote(5 * MB), &dest).await.unwrap();
        assert_eq!(file.transport, Transport::Standard);
        assert_eq!(file.size, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_boundary_size_stays_on_standard() {
        let acquisition = MediaAcquisition::new(
            quiet_chat(),
            unused_transport(),
            Some(unused_transport()),
            limits(),
        );
        assert_eq!(acquisition.select_transport(20 * MB), Transport::Standard);
        assert_eq!(acquisition.select_transport(20 * MB + 1), Transport::LargeFile);
    }

    #[tokio::test]
    async fn test_large_file_uses_large_file_transport() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("in.mp4");
        let acquisition = MediaAcquisition::new(
            quiet_chat(),
            unused_transport(),
            Some(writing_transport(1, b"big video")),
            limits(),
        );

        let file = acquisition.acquire(STATUS, &remote(25 * MB), &dest).await.unwrap();
        assert_eq!(file.transport, Transport::LargeFile);
    }

    #[tokio::test]
    async fn test_over_cap_is_refused_before_transfer() {
        let dir = tempdir().unwrap();
        let acquisition = MediaAcquisition::new(
            quiet_chat(),
            unused_transport(),
            Some(unused_transport()),
            limits(),
        );

        let err = acquisition
            .acquire(STATUS, &remote(2001 * MB), &dir.path().join("in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_large_file_failure_falls_back_to_standard() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("in.mp4");
        let mut large_file = MockTransferPort::new();
        large_file
            .expect_download()
            .times(1)
            .returning(|_, dest| {
                std::fs::write(dest, b"part")?;
                Err(ChatError::Unavailable("connection refused".into()))
            });
        let acquisition = MediaAcquisition::new(
            quiet_chat(),
            writing_transport(1, b"whole file"),
            Some(large_file),
            limits(),
        );

        let file = acquisition.acquire(STATUS, &remote(25 * MB), &dest).await.unwrap();
        assert_eq!(file.transport, Transport::Standard);
        assert_eq!(std::fs::read(&dest).unwrap(), b"whole file");
    }

    #[tokio::test]
    async fn test_oversized_without_large_file_transport_is_unavailable() {
        let dir = tempdir().unwrap();
        let mut standard = MockTransferPort::new();
        standard
            .expect_download()
            .times(1)
            .returning(|_, _| Err(ChatError::TooLarge("Bad Request: file is too big".into())));
        let acquisition = MediaAcquisition::new(quiet_chat(), standard, None, limits());

        let err = acquisition
            .acquire(STATUS, &remote(25 * MB), &dir.path().join("in.mp4"))
            .await
            .unwrap_err();
        match err {
            AcquireError::TransportUnavailable { size, limit } => {
                assert_eq!(size, 25 * MB);
                assert_eq!(limit, 20 * MB);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_both_transports_failing_surfaces_size_message() {
        let dir = tempdir().unwrap();
        let mut large_file = MockTransferPort::new();
        large_file
            .expect_download()
            .returning(|_, _| Err(ChatError::Unavailable("down".into())));
        let mut standard = MockTransferPort::new();
        standard
            .expect_download()
            .returning(|_, _| Err(ChatError::TooLarge("file is too big".into())));
        let acquisition = MediaAcquisition::new(quiet_chat(), standard, Some(large_file), limits());

        let err = acquisition
            .acquire(STATUS, &remote(30 * MB), &dir.path().join("in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::TransportUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_plain_failure_is_transfer_error() {
        let dir = tempdir().unwrap();
        let mut standard = MockTransferPort::new();
        standard
            .expect_download()
            .returning(|_, _| Err(ChatError::Request("network down".into())));
        let acquisition = MediaAcquisition::new(quiet_chat(), standard, None, limits());

        let err = acquisition
            .acquire(STATUS, &remote(MB), &dir.path().join("in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Transfer(ChatError::Request(_))));
    }
}
