//! Error types for ingestion and publishing.

use chrono::{DateTime, Utc};
use thiserror::Error;
use wx_core::{ConfigError, StoreError};

/// Failure of a single publish attempt.
///
/// None of these are fatal: the scheduler logs them and tries again on the
/// next tick.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The latest reading could not be read from the store.
    #[error("failed to get latest weather data: {0}")]
    Store(#[from] StoreError),

    /// The latest reading is older than the freshness threshold.
    #[error("weather data is too old for publishing (timestamp: {timestamp}, age: {age_secs}s)")]
    Stale {
        timestamp: DateTime<Utc>,
        age_secs: i64,
    },

    /// Connection failure, timeout or body error.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The destination answered with a non-2xx status.
    #[error("HTTP request returned non-success status: {status}, body: {body}")]
    Status { status: u16, body: String },

    /// The publish call panicked.
    #[error("publish panicked: {0}")]
    Panicked(String),
}

/// Lifecycle and construction errors of a publisher.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// `start` was called while the publisher is running.
    #[error("publisher {0} is already running")]
    AlreadyRunning(String),

    /// The interval is zero or too large for the timer.
    #[error("publisher {0} has an interval that cannot be scheduled")]
    InvalidInterval(String),

    /// The publisher configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
