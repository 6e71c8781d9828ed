// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Browser/DOM automation failed
    #[error("Driver error: {0}")]
    Driver(String),

    /// A bounded wait ran out of time
    #[error("Timed out after {after_ms}ms while {action}")]
    Timeout { action: String, after_ms: u64 },

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The crawl lost track of the listing and cannot continue
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Checkpointed page could not be reached again
    #[error("Could not restore page {target}: pager stopped at page {reached}")]
    Restore { target: u32, reached: u32 },
}

impl AppError {
    /// Create a driver error.
    pub fn driver(message: impl fmt::Display) -> Self {
        Self::Driver(message.to_string())
    }

    /// Create a timeout error for the named action.
    pub fn timeout(action: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            action: action.into(),
            after_ms,
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a navigation error.
    pub fn navigation(message: impl Into<String>) -> Self {
        Self::Navigation(message.into())
    }
}

#[cfg(feature = "chrome")]
impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        Self::Driver(e.to_string())
    }
}
