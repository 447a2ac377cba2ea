//! End-to-end handling of one media message: download, encode, upload,
//! report and always clean up.

use super::acquisition::MediaAcquisition;
use super::delivery::ResultDelivery;
use super::error::JobError;
use super::orchestrator::EncodeOrchestrator;
use super::reporter::update_status;
use super::settings::load_or_create_preferences;
use crate::adapters::local::fs::JobWorkspace;
use crate::domain::av::probe::ProbeReport;
use crate::domain::av::progress::{format_duration, format_file_size};
use crate::domain::jobs::{MediaRequest, MessageRef, Transport};
use crate::domain::preferences::{EncodingPreferences, UploadMode};
use crate::ports::chat::ChatPort;
use crate::ports::encoder::EncoderPort;
use crate::ports::repository::UserRepository;
use crate::ports::transfer::TransferPort;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub const UPLOAD_CAPTION: &str = "✅ Encoded successfully!";

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub input_size: u64,
    pub output_size: u64,
    pub transport: Transport,
    pub upload_mode: UploadMode,
    pub download_time: Duration,
    pub encode_time: Duration,
    pub elapsed: Duration,
}

impl JobReport {
    pub fn render(&self, output_probe: Option<&ProbeReport>) -> String {
        let mut text = format!(
            "✅ Done!\n\n📦 {} → {}",
            format_file_size(self.input_size),
            format_file_size(self.output_size)
        );
        if self.input_size > 0 {
            let change = 100.0 - (self.output_size as f64 / self.input_size as f64 * 100.0);
            if change >= 0.0 {
                text.push_str(&format!(" ({change:.1}% smaller)"));
            } else {
                text.push_str(&format!(" ({:.1}% larger)", -change));
            }
        }
        if let Some(summary) = output_probe.map(ProbeReport::summary).filter(|s| !s.is_empty()) {
            text.push_str(&format!("\n🎞 {summary}"));
        }
        text.push_str(&format!(
            "\n📤 Sent as {}\n⏱ Download {} · Encode {} · Total {}",
            self.upload_mode,
            format_duration(self.download_time.as_secs()),
            format_duration(self.encode_time.as_secs()),
            format_duration(self.elapsed.as_secs())
        ));
        text
    }
}

pub struct EncodeJobService<C: ?Sized, T, E, R: ?Sized> {
    chat: Arc<C>,
    repo: Arc<R>,
    acquisition: MediaAcquisition<C, T>,
    orchestrator: EncodeOrchestrator<C, E>,
    delivery: ResultDelivery<C>,
    temp_dir: PathBuf,
    permits: Arc<Semaphore>,
}

impl<C, T, E, R> EncodeJobService<C, T, E, R>
where
    C: ChatPort + ?Sized,
    T: TransferPort,
    E: EncoderPort,
    R: UserRepository + ?Sized,
{
    pub fn new(
        chat: Arc<C>,
        repo: Arc<R>,
        acquisition: MediaAcquisition<C, T>,
        orchestrator: EncodeOrchestrator<C, E>,
        delivery: ResultDelivery<C>,
        temp_dir: PathBuf,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            chat,
            repo,
            acquisition,
            orchestrator,
            delivery,
            temp_dir,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub async fn shutdown(&self) {
        self.permits.close();
        self.acquisition.shutdown().await;
    }

    /// Process one media message to completion. Failures are reported in the
    /// chat, never returned; the job workspace is removed on every path.
    pub async fn handle_media(&self, request: MediaRequest) -> Option<JobReport> {
        let status = match self
            .chat
            .send_text(request.chat_id, "📨 Received your file…")
            .await
        {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, chat_id = request.chat_id, "could not send status message");
                return None;
            }
        };

        let _permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                update_status(
                    self.chat.as_ref(),
                    status,
                    "⏳ Queued, other files are being encoded. Yours starts shortly…",
                )
                .await;
                match self.permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        update_status(self.chat.as_ref(), status, "❌ The bot is shutting down.")
                            .await;
                        return None;
                    }
                }
            }
        };

        let workspace = match JobWorkspace::create(&self.temp_dir, &request.job_key()).await {
            Ok(workspace) => workspace,
            Err(e) => {
                let err = JobError::from(e);
                error!(error = %err, "could not create workspace");
                update_status(self.chat.as_ref(), status, &err.user_message()).await;
                return None;
            }
        };

        let outcome = AssertUnwindSafe(self.run_job(&request, status, &workspace))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(panic.as_ref()))));

        if let Err(e) = workspace.cleanup().await {
            warn!(error = %e, job = %request.job_key(), "workspace cleanup failed");
        }

        match outcome {
            Ok(report) => {
                info!(
                    job = %request.job_key(),
                    input_size = report.input_size,
                    output_size = report.output_size,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "job complete"
                );
                Some(report)
            }
            Err(err) => {
                error!(job = %request.job_key(), phase = err.phase(), error = %err, "job failed");
                update_status(self.chat.as_ref(), status, &err.user_message()).await;
                None
            }
        }
    }

    async fn run_job(
        &self,
        request: &MediaRequest,
        status: MessageRef,
        workspace: &JobWorkspace,
    ) -> Result<JobReport, JobError> {
        let started = Instant::now();
        let prefs = self.preferences_for(request.user_id).await;

        let input = workspace.input_path(request.file.file_name.as_deref(), request.message_id);
        let downloaded = self.acquisition.acquire(status, &request.file, &input).await?;

        let output = workspace.output_path(&downloaded.path);
        let encoded = self
            .orchestrator
            .encode(status, &downloaded.path, &output, &prefs)
            .await?;

        update_status(
            self.chat.as_ref(),
            status,
            &format!("📤 Uploading {}…", format_file_size(encoded.size)),
        )
        .await;
        let output_size = self
            .delivery
            .deliver(request.chat_id, &encoded.output, prefs.upload_mode, UPLOAD_CAPTION)
            .await?;

        let output_probe = match self.orchestrator.probe(&encoded.output).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "could not probe encoded output");
                None
            }
        };

        let report = JobReport {
            input_size: downloaded.size,
            output_size,
            transport: downloaded.transport,
            upload_mode: prefs.upload_mode,
            download_time: downloaded.elapsed,
            encode_time: encoded.elapsed,
            elapsed: started.elapsed(),
        };
        update_status(self.chat.as_ref(), status, &report.render(output_probe.as_ref())).await;
        Ok(report)
    }

    /// Storage trouble never blocks a job; defaults are used instead.
    async fn preferences_for(&self, user_id: i64) -> EncodingPreferences {
        match load_or_create_preferences(self.repo.as_ref(), user_id).await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, user_id, "falling back to default preferences");
                EncodingPreferences::default()
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
