//! Error types for forcelink-auth.
//!
//! Error messages never carry the consumer secret or an access token.

/// Result type alias for forcelink-auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for forcelink-auth operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// OAuth error response from the token endpoint.
    #[error("OAuth error: {error} - {description}")]
    OAuth { error: String, description: String },

    /// Missing or malformed domain, key or secret.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Transport failure talking to the token endpoint.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Environment variable not set.
    #[error("Environment variable not set: {0}")]
    EnvVar(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors can echo the request URL; keep the message generic if it looks sensitive
        let message = err.to_string();
        let sanitized = if message.contains("client_secret") || message.contains("token=") {
            "HTTP request failed (details redacted for security)".to_string()
        } else {
            message
        };
        Error::with_source(ErrorKind::Http(sanitized), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Serialization(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::InvalidCredentials(format!("domain: {err}")), err)
    }
}

/// Token exchange failures reach the dispatcher as authentication errors.
impl From<Error> for forcelink_client::Error {
    fn from(err: Error) -> Self {
        let kind = match &err.kind {
            ErrorKind::Http(message) => forcelink_client::ErrorKind::Connection(message.clone()),
            other => forcelink_client::ErrorKind::Authentication(other.to_string()),
        };
        forcelink_client::Error::with_source(kind, err)
    }
}
