use super::reporter::ProgressReporter;
use crate::domain::av::command::{build_encode_command, EncodeCommand};
use crate::domain::av::probe::ProbeReport;
use crate::domain::jobs::MessageRef;
use crate::domain::preferences::EncodingPreferences;
use crate::ports::chat::ChatPort;
use crate::ports::encoder::{EncodeError, EncoderPort};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Characters of encoder stderr surfaced to the user on failure.
const DIAGNOSTIC_EXCERPT: usize = 200;

const PROGRESS_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub ffmpeg: PathBuf,
    pub timeout: Duration,
    pub progress_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutcome {
    pub output: PathBuf,
    pub size: u64,
    pub elapsed: Duration,
    pub source_duration: Option<u64>,
}

pub struct EncodeOrchestrator<C: ?Sized, E> {
    chat: Arc<C>,
    encoder: E,
    settings: EncoderSettings,
}

impl<C, E> EncodeOrchestrator<C, E>
where
    C: ChatPort + ?Sized,
    E: EncoderPort,
{
    pub fn new(chat: Arc<C>, encoder: E, settings: EncoderSettings) -> Self {
        Self {
            chat,
            encoder,
            settings,
        }
    }

    pub fn command_for(
        &self,
        input: &Path,
        output: &Path,
        prefs: &EncodingPreferences,
        with_progress: bool,
    ) -> EncodeCommand {
        build_encode_command(&self.settings.ffmpeg, input, output, prefs, with_progress)
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeReport, EncodeError> {
        self.encoder.probe(path).await
    }

    /// Encode `input` into `output`, streaming progress into `status`.
    ///
    /// Succeeds only when the process exits with 0 and left a non-empty file.
    pub async fn encode(
        &self,
        status: MessageRef,
        input: &Path,
        output: &Path,
        prefs: &EncodingPreferences,
    ) -> Result<EncodeOutcome, EncodeError> {
        let source_duration = match self.encoder.probe(input).await {
            Ok(report) => report.duration_secs(),
            Err(e) => {
                warn!(error = %e, input = %input.display(), "probe failed, progress disabled");
                None
            }
        };

        let command = self.command_for(input, output, prefs, source_duration.is_some());
        info!(command = %command.display(), ?source_duration, "starting encoder");

        let label = format!(
            "{} · {} · CRF {} · {}-bit",
            prefs.vcodec.encoder_library(),
            match prefs.resolution.height() {
                Some(h) => format!("{h}p"),
                None => "original size".to_string(),
            },
            prefs.crf,
            prefs.bits
        );
        let mut reporter = ProgressReporter::new(
            self.chat.as_ref(),
            status,
            source_duration,
            self.settings.progress_interval,
            label,
        );
        reporter.start().await;

        let started = Instant::now();
        let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
        let run = self.encoder.run(&command, tx, self.settings.timeout);
        tokio::pin!(run);

        let exit = loop {
            tokio::select! {
                result = &mut run => break result?,
                Some(sample) = rx.recv() => reporter.observe(sample).await,
            }
        };
        let elapsed = started.elapsed();

        if !exit.success() {
            let diagnostics = excerpt(&exit.diagnostics);
            warn!(code = ?exit.code, %diagnostics, "encoder failed");
            return Err(EncodeError::Failed {
                code: exit.code,
                diagnostics,
            });
        }

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => return Err(EncodeError::MissingOutput(output.to_path_buf())),
        };

        reporter.finish().await;
        info!(size, elapsed_ms = elapsed.as_millis() as u64, "encode complete");

        Ok(EncodeOutcome {
            output: output.to_path_buf(),
            size,
            elapsed,
            source_duration,
        })
    }
}

fn excerpt(diagnostics: &str) -> String {
    diagnostics.trim().chars().take(DIAGNOSTIC_EXCERPT).collect()
}
