//! Error types for forcelink-rest.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Malformed record or query shape, raised before any I/O.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client(forcelink_client::ErrorKind::Validation(
            message.into(),
        )))
    }

    /// The client-level kind, if this error came from the dispatcher or codec.
    pub fn client_kind(&self) -> Option<&forcelink_client::ErrorKind> {
        match &self.kind {
            ErrorKind::Client(kind) | ErrorKind::Chunk { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::Validation(_))
        )
    }

    /// Copy of this error without its source chain.
    pub(crate) fn detached(&self) -> Self {
        Self::new(self.kind.clone())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Client(forcelink_client::ErrorKind),

    /// One dispatch call of a batched operation failed.
    #[error("chunk {index} failed: {kind}")]
    Chunk {
        index: usize,
        kind: forcelink_client::ErrorKind,
    },

    /// The server answered with a shape this client does not understand.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("{0}")]
    Other(String),
}

impl From<forcelink_client::Error> for Error {
    fn from(err: forcelink_client::Error) -> Self {
        Error {
            kind: ErrorKind::Client(err.kind.clone()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Client(forcelink_client::ErrorKind::Json(err.to_string())),
            source: Some(Box::new(err)),
        }
    }
}
