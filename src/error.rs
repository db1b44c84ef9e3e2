//! Error types for the weather data service

use thiserror::Error;

/// Error type covering every failure class in the weather core.
///
/// Only `Validation` is ever visible to callers of the orchestrator; the
/// remaining variants are raised by the provider client and the geocoding
/// resolver and absorbed (with logging) by the layers above them.
#[derive(Error, Debug)]
pub enum WeatherServiceError {
    /// Malformed direct input (bad coordinates, query too short/long).
    /// Raised immediately, never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Transport-level failure from the HTTP layer.
    #[error("Network error: {0}")]
    Network(String),

    /// An outbound request tripped its cancellation deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The upstream response decoded but is missing required sections.
    /// Still retried, since it may be a transient upstream glitch.
    #[error("Unexpected response shape: {0}")]
    UpstreamShape(String),

    /// A geocoding provider failed or answered with an error body.
    /// Converted into provider fallback or an empty result set.
    #[error("Geocoding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The persistent settings store failed a read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl WeatherServiceError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create an upstream shape error
    pub fn shape<S: Into<String>>(message: S) -> Self {
        Self::UpstreamShape(message.into())
    }
}

impl From<serde_json::Error> for WeatherServiceError {
    fn from(err: serde_json::Error) -> Self {
        WeatherServiceError::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for WeatherServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WeatherServiceError::Timeout(err.to_string())
        } else {
            WeatherServiceError::Network(err.to_string())
        }
    }
}

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let validation = WeatherServiceError::validation("latitude out of range");
        assert!(matches!(validation, WeatherServiceError::Validation(_)));
        assert!(validation.to_string().contains("latitude out of range"));

        let shape = WeatherServiceError::shape("missing hourly section");
        assert!(matches!(shape, WeatherServiceError::UpstreamShape(_)));
    }
}
