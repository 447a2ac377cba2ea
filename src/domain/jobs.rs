use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file announced by an inbound chat message, not fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub file_id: String,
    pub file_name: Option<String>,
    /// Size declared by the platform, in bytes.
    pub size: u64,
}

/// Address of a message the bot can edit later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// One media-received event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub chat_id: i64,
    pub message_id: i32,
    pub user_id: i64,
    pub file: RemoteFile,
}

impl MediaRequest {
    /// Unique per inbound message, used to name the job workspace.
    pub fn job_key(&self) -> String {
        format!("{}_{}", self.chat_id, self.message_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Standard,
    LargeFile,
}

impl Transport {
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Standard => "standard",
            Transport::LargeFile => "large-file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub joined_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(user_id: i64, username: Option<String>, first_name: impl Into<String>) -> Self {
        Self {
            user_id,
            username,
            first_name: first_name.into(),
            joined_at: Utc::now(),
        }
    }
}
