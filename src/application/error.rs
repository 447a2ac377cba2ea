//! Job-level error taxonomy. Every variant maps to exactly one user-facing text.

use crate::domain::av::progress::{format_duration, format_file_size};
use crate::ports::chat::ChatError;
use crate::ports::encoder::EncodeError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("declared size {size} exceeds the {limit} byte cap")]
    TooLarge { size: u64, limit: u64 },
    #[error("{size} byte file needs the large-file transport, standard limit is {limit}")]
    TransportUnavailable { size: u64, limit: u64 },
    #[error("download failed: {0}")]
    Transfer(#[from] ChatError),
    #[error("download exceeded {0:?}")]
    Timeout(Duration),
    #[error("downloaded file is empty")]
    Empty,
    #[error("workspace io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    pub fn user_message(&self) -> String {
        match self {
            AcquireError::TooLarge { size, limit } => format!(
                "❌ File too large: {} exceeds the maximum of {}.",
                format_file_size(*size),
                format_file_size(*limit)
            ),
            AcquireError::TransportUnavailable { size, limit } => format!(
                "❌ This file is {} but only files up to {} can be downloaded right now. \
                 Please send a smaller file.",
                format_file_size(*size),
                format_file_size(*limit)
            ),
            AcquireError::Timeout(limit) => format!(
                "⏰ Download took longer than {} and was stopped. Please try again.",
                format_duration(limit.as_secs())
            ),
            AcquireError::Transfer(_) | AcquireError::Empty | AcquireError::Io(_) => {
                "❌ Failed to download the file. Please try sending it again.".to_string()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("output of {size} bytes exceeds the {limit} byte upload limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("upload failed: {0}")]
    Transfer(#[from] ChatError),
    #[error("upload exceeded {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    pub fn user_message(&self) -> String {
        match self {
            DeliveryError::TooLarge { size, limit } => format!(
                "❌ The encoded file is {} which is above the {} upload limit.\n\
                 Try a higher CRF or a lower resolution, e.g. /set crf 35 or /set resolution 360.",
                format_file_size(*size),
                format_file_size(*limit)
            ),
            DeliveryError::Timeout(limit) => format!(
                "⏰ Upload took longer than {} and was stopped. Please try again.",
                format_duration(limit.as_secs())
            ),
            DeliveryError::Transfer(_) | DeliveryError::Io(_) => {
                "❌ Failed to upload the encoded file. Please try again.".to_string()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("job panicked: {0}")]
    Panicked(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn user_message(&self) -> String {
        match self {
            JobError::Acquire(e) => e.user_message(),
            JobError::Encode(e) => e.user_message(),
            JobError::Delivery(e) => e.user_message(),
            JobError::Panicked(_) | JobError::Io(_) => {
                "❌ Unexpected error while processing your file. Please try again later."
                    .to_string()
            }
        }
    }

    /// Short phase label for logs.
    pub fn phase(&self) -> &'static str {
        match self {
            JobError::Acquire(_) => "download",
            JobError::Encode(_) => "encode",
            JobError::Delivery(_) => "upload",
            JobError::Panicked(_) => "panic",
            JobError::Io(_) => "workspace",
        }
    }
}
