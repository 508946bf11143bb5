//! Common Infrastructure Module
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, LogFormat, WatcherConfig};
pub use error::{AppError, Result};
pub use logging::{
    init_from_config, init_logging, log_deposit_event, log_poll_failure, log_system_event,
    EventCategory, LogEvent, LogLevel, LoggingError,
};
