//! Encodebot - Telegram video re-encoding bot
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (preferences, encoder command, probe, progress)
//! - ports/: Trait definitions (chat, transfer, encoder, repository)
//! - adapters/: Concrete implementations (teloxide, ffmpeg, Redis, SQLite, temp files)
//! - application/: Generic services (acquisition, orchestrator, delivery, pipeline, settings)
//! - config: Environment configuration
//!
//! # Features
//! - `redis`: Redis user store (deadpool-redis)
//! - `sqlite`: SQLite user store (rusqlite)
//!
//! At least one store must be enabled; both are on by default.

#[cfg(not(any(feature = "redis", feature = "sqlite")))]
compile_error!("enable at least one user store: the `redis` or `sqlite` feature");

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use config::BotConfig;
pub use domain::av;
