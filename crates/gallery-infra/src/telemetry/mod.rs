//! Tracing initialization
//!
//! Human-readable logs in development, JSON lines in production. The filter comes
//! from `RUST_LOG` when set.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};
