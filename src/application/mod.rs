//! Application layer - Generic services that use ports.

pub mod acquisition;
pub mod delivery;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod reporter;
pub mod settings;
