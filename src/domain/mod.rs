//! Domain layer - Pure business logic.

// Encoder command, probe report and progress math
pub mod av;

// Inbound job and user definitions
pub mod jobs;

// Per-user encoding preferences
pub mod preferences;
