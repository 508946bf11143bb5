//! Common Error Types for the Deposit Watcher
//!
//! Root error for the service shell. The core keeps its own narrower errors
//! (`QueryError`, `RecordError`, `WatcherError`) and converts into this one.

use thiserror::Error;

use crate::indexer::QueryError;
use crate::watcher::WatcherError;

/// Root error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Ledger indexer errors
    #[error("indexer error: {0}")]
    Indexer(#[from] QueryError),

    /// Deposit watcher errors
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Indexer(_) | AppError::Io(_) => true,
            AppError::Watcher(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get error code for API responses and structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Logging(_) => "LOGGING_ERROR",
            AppError::Indexer(_) => "INDEXER_ERROR",
            AppError::Watcher(_) => "WATCHER_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
