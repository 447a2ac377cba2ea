use crate::domain::av::command::EncodeCommand;
use crate::domain::av::probe::ProbeReport;
use crate::domain::av::progress::{format_duration, ProgressSample};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder exited with {code:?}: {diagnostics}")]
    Failed {
        code: Option<i32>,
        diagnostics: String,
    },
    #[error("encoder produced no output at {0}")]
    MissingOutput(PathBuf),
    #[error("encoding exceeded {0:?}")]
    Timeout(Duration),
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    pub fn user_message(&self) -> String {
        match self {
            EncodeError::Failed { code, diagnostics } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                if diagnostics.is_empty() {
                    format!("❌ Encoding failed (exit code {code}). Try a different codec or resolution.")
                } else {
                    format!(
                        "❌ Encoding failed (exit code {code}).\n{diagnostics}\n\nTry a different codec or resolution."
                    )
                }
            }
            EncodeError::MissingOutput(_) => {
                "❌ Encoding finished but produced no output. Try a different codec or resolution."
                    .to_string()
            }
            EncodeError::Timeout(limit) => format!(
                "⏰ Encoding took longer than {} and was stopped. Try a lower resolution or a higher CRF.",
                format_duration(limit.as_secs())
            ),
            EncodeError::Spawn { .. } => {
                "❌ The encoder could not be started. Please contact the bot owner.".to_string()
            }
            EncodeError::Probe(_) | EncodeError::Io(_) => {
                "❌ Unexpected error while encoding. Please try again later.".to_string()
            }
        }
    }
}

/// Result of a finished encoder process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeExit {
    pub code: Option<i32>,
    /// Captured stderr.
    pub diagnostics: String,
}

impl EncodeExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncoderPort: Send + Sync {
    /// Inspect a media file.
    async fn probe(&self, input: &Path) -> Result<ProbeReport, EncodeError>;

    /// Run `command` to completion, forwarding decoded progress samples.
    /// The process is killed once `timeout` elapses.
    async fn run(
        &self,
        command: &EncodeCommand,
        progress: mpsc::Sender<ProgressSample>,
        timeout: Duration,
    ) -> Result<EncodeExit, EncodeError>;
}
