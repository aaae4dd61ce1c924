//! DML operation and per-record result types.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{Error, ErrorKind, Result};

/// Record-level write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmlOperation {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl DmlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmlOperation::Insert => "insert",
            DmlOperation::Update => "update",
            DmlOperation::Upsert => "upsert",
            DmlOperation::Delete => "delete",
        }
    }

    /// Update and delete address existing records by `Id`.
    pub fn requires_id(&self) -> bool {
        matches!(self, DmlOperation::Update | DmlOperation::Delete)
    }
}

impl std::fmt::Display for DmlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Salesforce error attached to a record result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DmlError {
    #[serde(rename = "statusCode", alias = "errorCode")]
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl DmlError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Describe a failed request the way a record-level error would.
    pub fn from_client_error(err: &forcelink_client::ErrorKind) -> Self {
        match err {
            forcelink_client::ErrorKind::Remote {
                status,
                error_code,
                message,
                fields,
            } => Self {
                code: error_code
                    .clone()
                    .unwrap_or_else(|| format!("HTTP_{status}")),
                message: message.clone(),
                fields: fields.clone(),
            },
            other => Self::new("REQUEST_FAILED", other.to_string()),
        }
    }
}

/// Outcome for one input record.
#[derive(Debug, Clone, PartialEq)]
pub struct DmlResult {
    /// Position of the record in the caller's input.
    pub original_index: usize,
    pub id: Option<String>,
    pub success: bool,
    /// Set by upserts: whether the record was created rather than updated.
    pub created: Option<bool>,
    pub errors: Vec<DmlError>,
}

impl DmlResult {
    pub fn succeeded(original_index: usize, id: Option<String>) -> Self {
        Self {
            original_index,
            id,
            success: true,
            created: None,
            errors: Vec::new(),
        }
    }

    pub fn failed(original_index: usize, errors: Vec<DmlError>) -> Self {
        Self {
            original_index,
            id: None,
            success: false,
            created: None,
            errors,
        }
    }
}

/// A dispatch call of a batched operation that failed as a whole.
#[derive(Debug)]
pub struct ChunkError {
    /// Dispatch index, in input order.
    pub index: usize,
    /// Input positions covered by the failed call.
    pub range: Range<usize>,
    pub error: forcelink_client::Error,
}

/// Result of a batched DML call.
///
/// `results` always holds exactly one entry per input record, in input
/// order. Records in a failed call carry that call's error, and the call
/// itself is listed in `chunk_errors`.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<DmlResult>,
    pub chunk_errors: Vec<ChunkError>,
}

impl BatchOutcome {
    /// True when every call went through and every record succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.chunk_errors.is_empty() && self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DmlResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Per-record results, or the first failed call as an error.
    ///
    /// Record-level failures inside successful calls are not errors here;
    /// they stay in the returned results.
    pub fn into_results(self) -> Result<Vec<DmlResult>> {
        match self.chunk_errors.into_iter().next() {
            Some(chunk) => Err(Error {
                kind: ErrorKind::Chunk {
                    index: chunk.index,
                    kind: chunk.error.kind.clone(),
                },
                source: Some(Box::new(chunk.error)),
            }),
            None => Ok(self.results),
        }
    }
}
