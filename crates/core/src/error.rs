//! Error types shared by the session components

use thiserror::Error;

/// Why a credential renewal did not produce a fresh credential.
///
/// Every caller waiting on the same single-flight renewal receives a clone of
/// the same value, so this type must stay `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalFailure {
    /// The renewal endpoint answered with a non-2xx status
    #[error("Renewal rejected with status {status}")]
    Rejected { status: u16 },

    /// The renewal endpoint answered 2xx without a usable credential
    #[error("Malformed renewal response: {0}")]
    MalformedResponse(String),

    /// The renewal call never produced a response
    #[error("Renewal request failed: {0}")]
    Network(String),
}

impl From<TransportError> for RenewalFailure {
    fn from(err: TransportError) -> Self {
        Self::Network(err.to_string())
    }
}

/// Failure to exchange a request with the server at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request URL could not be resolved against the page origin
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// Network or fetch-level failure
    #[error("Request failed: {0}")]
    Request(String),
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Errors surfaced by the typed convenience API of the authenticated client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: http::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the error means the session could not be kept alive
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

/// Failure to assemble a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    /// A required collaborator was not supplied
    #[error("Missing session collaborator: {0}")]
    Missing(&'static str),

    /// The default transport could not be created
    #[error(transparent)]
    Transport(#[from] TransportError),
}
