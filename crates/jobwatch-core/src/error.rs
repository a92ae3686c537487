use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for jobwatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// The shared browser process failed to start or stopped responding.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Extraction from a single site failed (navigation, selector mismatch).
    #[error("Scrape error ({site}): {message}")]
    ScrapeError { site: String, message: String },

    /// The webhook answered with a status other than 204 or 429.
    #[error("Delivery error (HTTP {status}): {message}")]
    DeliveryError { status: u16, message: String },

    /// The webhook asked us to back off.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// HTTP request could not be built or its response could not be read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    pub fn scrape(site: impl Into<String>, message: impl ToString) -> Self {
        AppError::ScrapeError {
            site: site.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error is a transient condition worth retrying.
    ///
    /// Only rate limiting qualifies; every other delivery failure is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::RateLimited { .. })
    }

    /// Returns true if the shared browser should be torn down after this
    /// error reaches the cycle boundary.
    pub fn should_force_close(&self) -> bool {
        !matches!(
            self,
            AppError::ConfigError(_) | AppError::RateLimited { .. }
        )
    }
}
