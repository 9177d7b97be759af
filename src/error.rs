//! Error types for mcp-resource-gate

/// Type-erased error, used where inner services may fail with anything.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Setup and upstream errors.
///
/// These never reach a protected handler: per-request authorization
/// failures are modelled by [`OAuthError`](crate::oauth::OAuthError) and
/// always terminate in an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// Result type alias for mcp-resource-gate
pub type Result<T> = std::result::Result<T, Error>;
