//! # Error Types
//!
//! Custom error types for Signal Survey using `thiserror`.
//!
//! None of these errors terminate the pipeline: every loop logs the failure
//! and defers the affected unit of work to its next natural cycle.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Signal Survey
#[derive(Debug, Error)]
pub enum SurveyError {
    /// Malformed or irrelevant NMEA sentence
    #[error("NMEA decode failure: {0}")]
    Decode(String),

    /// The modem did not answer a signal-quality query in time
    #[error("Modem query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// A local or remote write was not acknowledged
    #[error("Store write failure: {0}")]
    StoreWrite(String),

    /// The weather API call failed
    #[error("Weather fetch failure: {0}")]
    Fetch(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Local record store errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Remote store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Signal Survey
pub type Result<T> = std::result::Result<T, SurveyError>;
