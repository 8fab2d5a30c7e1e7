//! Custom error types for paperscout.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, ScoutError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for paperscout operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON/XML/HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status or provider error code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// CAPTCHA detected (Google Scholar)
    #[error("CAPTCHA detected, please refresh cookies")]
    Captcha,

    /// Missing API key for a source that requires one
    #[error("Source '{0}' requires an API key, none configured")]
    MissingKey(&'static str),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Export error
    #[error("Export error: {0}")]
    Export(String),
}

/// Result type alias using `ScoutError`
pub type Result<T> = std::result::Result<T, ScoutError>;
