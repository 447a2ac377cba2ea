//! Adapters - Concrete implementations of ports.

pub mod ffmpeg;
pub mod local;
pub mod telegram;
