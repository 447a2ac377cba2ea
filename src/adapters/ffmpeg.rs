//! ffmpeg/ffprobe subprocess adapter.

use crate::domain::av::command::{build_probe_args, EncodeCommand};
use crate::domain::av::probe::ProbeReport;
use crate::domain::av::progress::{parse_progress_line, ProgressSample};
use crate::ports::encoder::{EncodeError, EncodeExit, EncoderPort};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How much stderr is kept for diagnostics. The rest is drained and dropped.
const DIAGNOSTIC_CAPTURE: usize = 64 * 1024;

/// Time the progress reader gets to drain stdout after the process exits.
const READER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffprobe: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl EncoderPort for FfmpegEncoder {
    async fn probe(&self, input: &Path) -> Result<ProbeReport, EncodeError> {
        let output = TokioCommand::new(&self.ffprobe)
            .args(build_probe_args(input))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EncodeError::Probe(format!("{}: {}", self.ffprobe.display(), e)))?;

        if !output.status.success() {
            return Err(EncodeError::Probe(format!(
                "{} exited with {}: {}",
                self.ffprobe.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        ProbeReport::from_json(&output.stdout).map_err(|e| EncodeError::Probe(e.to_string()))
    }

    async fn run(
        &self,
        command: &EncodeCommand,
        progress: mpsc::Sender<ProgressSample>,
        timeout: Duration,
    ) -> Result<EncodeExit, EncodeError> {
        let mut child = TokioCommand::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;

        let cancel = CancellationToken::new();
        let reader = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(read_progress(stdout, progress, cancel.child_token())));
        let diagnostics = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_diagnostics(stderr)));

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(program = %command.program.display(), ?timeout, "encoder timed out, killing");
                cancel.cancel();
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill encoder");
                }
                if let Some(task) = diagnostics {
                    task.abort();
                }
                return Err(EncodeError::Timeout(timeout));
            }
        };

        if let Some(task) = reader {
            if tokio::time::timeout(READER_GRACE, task).await.is_err() {
                debug!("progress reader still busy after exit, cancelling");
            }
        }
        cancel.cancel();

        let status = status?;
        let diagnostics = match diagnostics {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        debug!(code = ?status.code(), "encoder exited");

        Ok(EncodeExit {
            code: status.code(),
            diagnostics,
        })
    }
}

/// Forward every decodable progress line. Samples are dropped rather than
/// stalling the pipe when the consumer lags.
async fn read_progress<R>(stream: R, progress: mpsc::Sender<ProgressSample>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(sample) = parse_progress_line(&line) {
                        let _ = progress.try_send(sample);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "progress stream closed");
                    break;
                }
            }
        }
    }
}

async fn collect_diagnostics<R>(mut stream: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = DIAGNOSTIC_CAPTURE.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn shell(script: &str) -> EncodeCommand {
        EncodeCommand {
            program: PathBuf::from("sh"),
            args: vec![OsString::from("-c"), OsString::from(script)],
            output: PathBuf::from("/dev/null"),
            reports_progress: true,
        }
    }

    #[tokio::test]
    async fn test_forwards_progress_and_captures_stderr() {
        let encoder = FfmpegEncoder::new("ffprobe");
        let (tx, mut rx) = mpsc::channel(16);
        let cmd = shell(
            "printf 'frame=1\\nout_time=00:00:02.000000\\nout_time_ms=4000000\\nout_time=N/A\\nprogress=end\\n'; echo 'warning: odd input' >&2",
        );

        let exit = encoder.run(&cmd, tx, Duration::from_secs(10)).await.unwrap();
        assert!(exit.success());
        assert_eq!(exit.diagnostics.trim(), "warning: odd input");

        let mut seen = Vec::new();
        while let Some(sample) = rx.recv().await {
            seen.push(sample.out_time_secs);
        }
        assert_eq!(seen, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_reports_non_zero_exit() {
        let encoder = FfmpegEncoder::new("ffprobe");
        let (tx, _rx) = mpsc::channel(1);
        let exit = encoder
            .run(&shell("echo 'Unknown encoder' >&2; exit 3"), tx, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!exit.success());
        assert_eq!(exit.code, Some(3));
        assert!(exit.diagnostics.contains("Unknown encoder"));
    }

    #[tokio::test]
    async fn test_kills_on_timeout() {
        let encoder = FfmpegEncoder::new("ffprobe");
        let (tx, _rx) = mpsc::channel(1);
        let started = std::time::Instant::now();
        let result = encoder
            .run(&shell("sleep 30"), tx, Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(EncodeError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let encoder = FfmpegEncoder::new("ffprobe");
        let (tx, _rx) = mpsc::channel(1);
        let cmd = EncodeCommand {
            program: PathBuf::from("/nonexistent/ffmpeg-binary"),
            args: vec![],
            output: PathBuf::from("/dev/null"),
            reports_progress: false,
        };
        let result = encoder.run(&cmd, tx, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(EncodeError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_probe_with_missing_binary_fails() {
        let encoder = FfmpegEncoder::new("/nonexistent/ffprobe-binary");
        let result = encoder.probe(Path::new("clip.mp4")).await;
        assert!(matches!(result, Err(EncodeError::Probe(_))));
    }
}
