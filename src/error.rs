use std::io;

/// Custom error type for webhooker operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to read request body: {0}")]
    RequestReadFailed(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use WebhookerError
pub type Result<T> = std::result::Result<T, WebhookerError>;
