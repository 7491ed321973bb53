//! Error types

use thiserror::Error;

/// Streaming feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("WebSocket connection error: {0}")]
    Transport(String),

    #[error("Feed disconnected")]
    Disconnected,

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Errors from the off-band HTTP sources (metadata, metrics, listing orders)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("No price data available for {0}")]
    NoData(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type FeedResult<T> = Result<T, FeedError>;
pub type FetchResult<T> = Result<T, FetchError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
