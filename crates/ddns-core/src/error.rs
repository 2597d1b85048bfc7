//! Error types for the DDNS system
//!
//! [`Error`] is the crate-wide error. Failures reported by a DNS provider API
//! carry an [`ApiError`] so the reconciliation path can tell a harmless
//! "nothing changed" answer from a stale record identifier or a hard failure.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Address discovery errors (unreachable source, no address in response)
    #[error("Address discovery error: {0}")]
    Discovery(String),

    /// Error code returned by the DNS provider API
    #[error("DNS provider error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a provider API error from a code and message
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api(ApiError::new(code, message))
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The provider API error, if this is one
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// An error code and message reported by a DNS provider API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}, {message}")]
pub struct ApiError {
    /// Provider error code (e.g. `DomainRecordDuplicate`)
    pub code: String,
    /// Human readable message from the provider
    pub message: String,
}

impl ApiError {
    /// The record already holds exactly the requested content.
    pub const DUPLICATE: &'static str = "DomainRecordDuplicate";

    /// The record identifier does not (or no longer) belong to the caller.
    pub const NOT_BELONG_TO_USER: &'static str = "DomainRecordNotBelongToUser";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(Self::DUPLICATE, message)
    }

    pub fn not_belong_to_user(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_BELONG_TO_USER, message)
    }

    /// The update was a no-op; treat as converged.
    pub fn is_duplicate(&self) -> bool {
        self.code == Self::DUPLICATE
    }

    /// The cached record identifier is stale and must be re-resolved.
    pub fn is_stale_reference(&self) -> bool {
        self.code == Self::NOT_BELONG_TO_USER
    }
}
