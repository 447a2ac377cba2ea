//! Audio/Video domain modules.

pub mod command;
pub mod probe;
pub mod progress;
