//! Error type for the `Salesforce` facade.
//!
//! Component errors are flattened so the client taxonomy is always one
//! match away: `Config`, `Validation`, `Authentication`, `Remote`, `State`
//! and friends all surface as [`ErrorKind::Client`], whichever crate raised
//! them.

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

    /// The client-level kind, including the kind behind a failed chunk.
    pub fn client_kind(&self) -> Option<&forcelink_client::ErrorKind> {
        match &self.kind {
            ErrorKind::Client(kind) => Some(kind),
            ErrorKind::Rest(forcelink_rest::ErrorKind::Chunk { kind, .. }) => Some(kind),
            ErrorKind::Bulk(kind) => kind.client_kind(),
            _ => None,
        }
    }

    /// Bulk jobs already running on the server when a multi-job submission
    /// failed.
    pub fn submitted_jobs(&self) -> &[String] {
        match &self.kind {
            ErrorKind::Bulk(forcelink_bulk::ErrorKind::Submission { submitted, .. }) => submitted,
            _ => &[],
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::Validation(_))
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::Config(_))
        )
    }

    pub fn is_state(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::State(_))
        )
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.client_kind(),
            Some(forcelink_client::ErrorKind::Authentication(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Client(forcelink_client::ErrorKind),

    /// REST-only failures (chunk errors, unexpected response shapes).
    #[error("{0}")]
    Rest(forcelink_rest::ErrorKind),

    /// Bulk-only failures (poll deadline, failed job, CSV input).
    #[error("{0}")]
    Bulk(forcelink_bulk::ErrorKind),
}

impl From<forcelink_client::Error> for Error {
    fn from(err: forcelink_client::Error) -> Self {
        Error {
            kind: ErrorKind::Client(err.kind.clone()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<forcelink_auth::Error> for Error {
    fn from(err: forcelink_auth::Error) -> Self {
        forcelink_client::Error::from(err).into()
    }
}

impl From<forcelink_rest::Error> for Error {
    fn from(err: forcelink_rest::Error) -> Self {
        let kind = match err.kind {
            forcelink_rest::ErrorKind::Client(kind) => ErrorKind::Client(kind),
            other => ErrorKind::Rest(other),
        };
        Error {
            kind,
            source: err.source,
        }
    }
}

impl From<forcelink_bulk::Error> for Error {
    fn from(err: forcelink_bulk::Error) -> Self {
        let kind = match err.kind {
            forcelink_bulk::ErrorKind::Client(kind) => ErrorKind::Client(kind),
            other => ErrorKind::Bulk(other),
        };
        Error {
            kind,
            source: err.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_client_kind_is_flattened() {
        let err: Error = forcelink_rest::Error::validation("record 2 has no Id").into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation error: record 2 has no Id");
    }

    #[test]
    fn test_chunk_error_exposes_client_kind() {
        let err: Error = forcelink_rest::Error::new(forcelink_rest::ErrorKind::Chunk {
            index: 1,
            kind: forcelink_client::ErrorKind::Timeout,
        })
        .into();
        assert!(matches!(err.kind, ErrorKind::Rest(_)));
        assert_eq!(err.client_kind(), Some(&forcelink_client::ErrorKind::Timeout));
    }

    #[test]
    fn test_bulk_timeout_stays_bulk() {
        let err: Error = forcelink_bulk::Error::new(forcelink_bulk::ErrorKind::Timeout {
            job_id: "750A".to_string(),
            waited: std::time::Duration::from_secs(1),
        })
        .into();
        assert!(err.client_kind().is_none());
        assert!(err.to_string().contains("750A"));
    }

    #[test]
    fn test_bulk_submission_exposes_jobs_and_cause() {
        let err: Error = forcelink_bulk::Error::new(forcelink_bulk::ErrorKind::Submission {
            chunk: 2,
            job_id: None,
            submitted: vec!["750A".to_string(), "750B".to_string()],
            cause: Box::new(forcelink_bulk::ErrorKind::Client(
                forcelink_client::ErrorKind::Authentication("expired".to_string()),
            )),
        })
        .into();
        assert!(err.is_auth_error());
        assert_eq!(err.submitted_jobs(), ["750A".to_string(), "750B".to_string()]);
    }
}
