//! Ports - Trait definitions the application layer is written against.

pub mod chat;
pub mod encoder;
pub mod repository;
pub mod transfer;
