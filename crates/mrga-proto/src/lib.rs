//! Shared data model, error taxonomy and configuration for the MRGA crates.

pub mod config;
pub mod error;
pub mod fallback;
pub mod platform;
pub mod protocol;
