//! Error types for forcelink-client.
//!
//! The taxonomy is shared by every crate in the workspace: higher layers wrap
//! [`ErrorKind`] rather than flattening it into strings, so callers can always
//! match on the original category.

/// Result type alias for forcelink-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for forcelink-client operations.
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

    /// Shorthand for a [`ErrorKind::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(message.into()))
    }

    /// Shorthand for a [`ErrorKind::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// Shorthand for a [`ErrorKind::State`] error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State(message.into()))
    }

    /// Returns true if this is a transient transport failure.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication(_))
    }

    /// HTTP status of a remote error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// Invalid caller-supplied limits or options. Never reaches the network.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed record or query shape. Never reaches the network.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credential acquisition or refresh failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Request timed out at the transport level.
    #[error("Request timeout")]
    Timeout,

    /// Connection could not be established or was reset.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-2xx response from Salesforce.
    #[error("Remote error: HTTP {status}{}: {message}", error_code.as_ref().map(|c| format!(" {c}")).unwrap_or_default())]
    Remote {
        status: u16,
        error_code: Option<String>,
        message: String,
        fields: Vec<String>,
    },

    /// Operation is not valid for the current state.
    #[error("State error: {0}")]
    State(String),

    /// A row value could not be converted to the declared field type.
    #[error("Decode error: field '{field}' at row {row}: cannot convert {value:?} ({reason})")]
    Decode {
        field: String,
        row: usize,
        value: String,
        reason: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// CSV encoding/decoding error.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true for transport failures that are safe to retry on idempotent requests.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Connection(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() || err.is_request() {
            ErrorKind::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Remote {
                status: status.as_u16(),
                error_code: None,
                message: err.to_string(),
                fields: Vec::new(),
            }
        } else if err.is_decode() {
            ErrorKind::Json(err.to_string())
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::with_source(ErrorKind::Csv(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::InvalidUrl(err.to_string()), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(Error::new(ErrorKind::Timeout).is_transient());
        assert!(Error::new(ErrorKind::Connection("reset".into())).is_transient());

        let remote = Error::new(ErrorKind::Remote {
            status: 503,
            error_code: None,
            message: "unavailable".into(),
            fields: vec![],
        });
        assert!(!remote.is_transient());
        assert_eq!(remote.status(), Some(503));

        assert!(!Error::validation("bad").is_transient());
        assert!(!Error::new(ErrorKind::Authentication("nope".into())).is_transient());
    }

    #[test]
    fn test_is_auth_error() {
        let err = Error::new(ErrorKind::Authentication("credential rejected".into()));
        assert!(err.is_auth_error());
        assert!(!Error::config("x").is_auth_error());
    }

    #[test]
    fn test_error_kind_display_messages() {
        let cases: Vec<(ErrorKind, &str)> = vec![
            (ErrorKind::Config("batch".into()), "Configuration error: batch"),
            (ErrorKind::Validation("no Id".into()), "Validation error: no Id"),
            (
                ErrorKind::Authentication("credential rejected".into()),
                "Authentication error: credential rejected",
            ),
            (ErrorKind::Timeout, "Request timeout"),
            (
                ErrorKind::Connection("refused".into()),
                "Connection error: refused",
            ),
            (
                ErrorKind::Remote {
                    status: 400,
                    error_code: Some("INVALID_FIELD".into()),
                    message: "No such column".into(),
                    fields: vec!["Foo".into()],
                },
                "Remote error: HTTP 400 INVALID_FIELD: No such column",
            ),
            (
                ErrorKind::Remote {
                    status: 500,
                    error_code: None,
                    message: "boom".into(),
                    fields: vec![],
                },
                "Remote error: HTTP 500: boom",
            ),
            (ErrorKind::State("job closed".into()), "State error: job closed"),
            (
                ErrorKind::Decode {
                    field: "Age".into(),
                    row: 3,
                    value: "abc".into(),
                    reason: "expected integer".into(),
                },
                "field 'Age' at row 3",
            ),
            (ErrorKind::Csv("bad quote".into()), "CSV error: bad quote"),
            (ErrorKind::Other("something else".into()), "something else"),
        ];

        for (kind, expected_substring) in cases {
            let display = kind.to_string();
            assert!(
                display.contains(expected_substring),
                "Expected '{display}' to contain '{expected_substring}'"
            );
        }
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::other("disk full");
        let err = Error::with_source(ErrorKind::Other("write failed".into()), source_err);

        assert!(err.source.is_some());
        assert_eq!(err.to_string(), "write failed");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err.kind, ErrorKind::Json(_)));
        assert!(err.source.is_some());
    }

    #[test]
    fn test_from_url_parse_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err.kind, ErrorKind::InvalidUrl(_)));
    }
}
