//! Error types for the market summary exporter

use thiserror::Error;

/// Errors that can occur when fetching summaries from a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

impl ProviderError {
    /// Maps a reqwest failure, keeping timeouts distinct
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }
}

/// Errors raised while resolving the startup configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A comma separated list resolved to no entries
    #[error("{name} must contain at least one entry")]
    EmptyList { name: &'static str },

    /// Refresh interval must be a positive number of seconds
    #[error("refresh interval must be greater than zero seconds")]
    InvalidInterval,

    /// Request timeout must be a positive number of seconds
    #[error("request timeout must be greater than zero seconds")]
    InvalidTimeout,

    /// Listen address is not a valid socket address
    #[error("invalid listen address {address:?}: {reason}")]
    InvalidListenAddress { address: String, reason: String },

    /// Telemetry path must be an absolute URL path
    #[error("invalid telemetry path {0:?}: must start with '/'")]
    InvalidTelemetryPath(String),
}

impl ConfigError {
    /// Creates an EmptyList error
    pub fn empty_list(name: &'static str) -> Self {
        Self::EmptyList { name }
    }

    /// Creates an InvalidListenAddress error
    pub fn invalid_listen_address(address: &str, reason: impl ToString) -> Self {
        Self::InvalidListenAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from the metric registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registering or encoding a metric failed
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The text encoder produced invalid UTF-8
    #[error("Invalid UTF-8 in metrics output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
