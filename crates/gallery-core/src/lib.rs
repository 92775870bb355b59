//! Gallery Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! the media conversion queue, the live-status hub and the HTTP API.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
