//! Telegram adapters built on teloxide.
//!
//! - `TelegramChat`: outbound messages, edits and uploads
//! - `TelegramTransfer`: file downloads through the public Bot API or a
//!   self-hosted Bot API server for large files
//! - `dispatch`: inbound update routing

mod chat;
pub mod dispatch;
mod transfer;

pub use chat::TelegramChat;
pub use transfer::TelegramTransfer;

use crate::ports::chat::ChatError;
use teloxide::RequestError;

/// Map a Bot API failure onto the chat error taxonomy.
pub(crate) fn classify_request_error(err: RequestError) -> ChatError {
    let text = err.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("too big") || lowered.contains("too large") {
        ChatError::TooLarge(text)
    } else {
        ChatError::Request(text)
    }
}
