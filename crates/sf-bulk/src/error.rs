//! Error types for forcelink-bulk.

use std::time::Duration;

use crate::types::JobState;

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

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client(forcelink_client::ErrorKind::Validation(
            message.into(),
        )))
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client(forcelink_client::ErrorKind::State(
            message.into(),
        )))
    }

    /// The client-level kind, if this error came from the dispatcher or codec.
    pub fn client_kind(&self) -> Option<&forcelink_client::ErrorKind> {
        self.kind.client_kind()
    }

    /// Wrap a failure of chunk `chunk`, keeping the ids of jobs already
    /// handed to the server.
    pub(crate) fn submission(
        self,
        chunk: usize,
        job_id: Option<String>,
        submitted: Vec<String>,
    ) -> Self {
        Error {
            kind: ErrorKind::Submission {
                chunk,
                job_id,
                submitted,
                cause: Box::new(self.kind),
            },
            source: self.source,
        }
    }

    /// Ids of jobs that were created and closed before the failure.
    pub fn submitted_jobs(&self) -> &[String] {
        match &self.kind {
            ErrorKind::Submission { submitted, .. } => submitted,
            _ => &[],
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::State(_))
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::Validation(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Client(forcelink_client::ErrorKind),
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("job {job_id} did not finish within {waited:?}")]
    Timeout { job_id: String, waited: Duration },
    #[error("job {job_id} ended {state}: {message}")]
    Job {
        job_id: String,
        state: JobState,
        message: String,
    },
    /// A multi-job submission stopped at `chunk`. `submitted` lists the
    /// jobs that were closed before it and are running on the server.
    #[error("chunk {chunk} failed after {n} job(s) submitted: {cause}", n = .submitted.len())]
    Submission {
        chunk: usize,
        job_id: Option<String>,
        submitted: Vec<String>,
        cause: Box<ErrorKind>,
    },
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    pub fn client_kind(&self) -> Option<&forcelink_client::ErrorKind> {
        match self {
            ErrorKind::Client(kind) => Some(kind),
            ErrorKind::Submission { cause, .. } => cause.client_kind(),
            _ => None,
        }
    }

    fn to_client_kind(&self) -> forcelink_client::ErrorKind {
        match self {
            ErrorKind::Client(kind) => kind.clone(),
            ErrorKind::Csv(message) => forcelink_client::ErrorKind::Csv(message.clone()),
            ErrorKind::Timeout { .. } => forcelink_client::ErrorKind::Timeout,
            ErrorKind::Submission { cause, .. } => cause.to_client_kind(),
            ErrorKind::Job { .. } | ErrorKind::Other(_) => {
                forcelink_client::ErrorKind::Other(self.to_string())
            }
        }
    }
}

impl From<forcelink_client::Error> for Error {
    fn from(err: forcelink_client::Error) -> Self {
        Error {
            kind: ErrorKind::Client(err.kind.clone()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<forcelink_rest::Error> for Error {
    fn from(err: forcelink_rest::Error) -> Self {
        let kind = match err.client_kind() {
            Some(kind) => ErrorKind::Client(kind.clone()),
            None => ErrorKind::Other(err.to_string()),
        };
        Error {
            kind,
            source: Some(Box::new(err)),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error {
            kind: ErrorKind::Csv(err.to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Csv(err.to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Page sources speak the client error type; keep the taxonomy where it maps.
impl From<Error> for forcelink_client::Error {
    fn from(err: Error) -> Self {
        let kind = err.kind.to_client_kind();
        forcelink_client::Error::with_source(kind, err)
    }
}
