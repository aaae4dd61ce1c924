//! Types for Bulk API 2.0.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use forcelink_client::batch::BULK_CEILING;
use forcelink_client::{ClientConfig, Record};

/// Deserialize API version that can be either a float (64.0) or string ("64.0").
pub(crate) fn deserialize_api_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ApiVersion {
        Float(f64),
        String(String),
    }

    Option::<ApiVersion>::deserialize(deserializer).map(|opt| {
        opt.map(|v| match v {
            ApiVersion::Float(f) => format!("{f:.1}"),
            ApiVersion::String(s) => s,
        })
    })
}

/// Bulk API 2.0 job states.
///
/// `Open → UploadComplete → InProgress → {JobComplete | Failed | Aborted}`.
/// The client drives the first transition; the rest are server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Accepting data
    Open,
    /// Closed for upload, queued for processing
    UploadComplete,
    InProgress,
    Aborted,
    JobComplete,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Aborted | JobState::JobComplete | JobState::Failed
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobState::JobComplete)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Open => "Open",
            JobState::UploadComplete => "UploadComplete",
            JobState::InProgress => "InProgress",
            JobState::Aborted => "Aborted",
            JobState::JobComplete => "JobComplete",
            JobState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Ingest operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperation {
    Insert,
    Update,
    Upsert,
    /// Soft delete (recycle bin)
    Delete,
    /// Permanent delete
    HardDelete,
}

impl BulkOperation {
    pub fn api_name(&self) -> &'static str {
        match self {
            BulkOperation::Insert => "insert",
            BulkOperation::Update => "update",
            BulkOperation::Upsert => "upsert",
            BulkOperation::Delete => "delete",
            BulkOperation::HardDelete => "hardDelete",
        }
    }

    /// Whether every row must carry an `Id`.
    pub fn requires_id(&self) -> bool {
        matches!(
            self,
            BulkOperation::Update | BulkOperation::Delete | BulkOperation::HardDelete
        )
    }
}

impl std::fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Line ending of uploaded CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineEnding {
    #[default]
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CRLF")]
    Crlf,
}

impl LineEnding {
    /// Line ending used by a CSV header line.
    pub fn of(header: &[u8]) -> Self {
        if header.ends_with(b"\r\n") {
            LineEnding::Crlf
        } else {
            LineEnding::Lf
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Request to create an ingest job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngestJobRequest {
    pub object: String,
    pub operation: BulkOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
    /// Lead and Case assignment rule to apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_rule_id: Option<String>,
    pub content_type: String,
    pub column_delimiter: String,
    pub line_ending: LineEnding,
}

impl CreateIngestJobRequest {
    pub fn new(object: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object: object.into(),
            operation,
            external_id_field_name: None,
            assignment_rule_id: None,
            content_type: "CSV".to_string(),
            column_delimiter: "COMMA".to_string(),
            line_ending: LineEnding::Lf,
        }
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field_name = Some(field.into());
        self
    }

    pub fn with_assignment_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.assignment_rule_id = Some(rule_id.into());
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

/// Request to create a query job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryJobRequest {
    pub query: String,
    /// `query`, or `queryAll` to include deleted and archived records.
    pub operation: String,
    pub column_delimiter: String,
    pub line_ending: LineEnding,
}

impl CreateQueryJobRequest {
    pub fn new(soql: impl Into<String>) -> Self {
        Self {
            query: soql.into(),
            operation: "query".to_string(),
            column_delimiter: "COMMA".to_string(),
            line_ending: LineEnding::Lf,
        }
    }

    pub fn with_query_all(mut self) -> Self {
        self.operation = "queryAll".to_string();
        self
    }
}

/// Body of a job state change (close or abort).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateJobStateRequest {
    pub state: JobState,
}

// =============================================================================
// Response Types
// =============================================================================

/// An ingest job as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub state: JobState,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub external_id_field_name: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub number_records_processed: i64,
    #[serde(default)]
    pub number_records_failed: i64,
    #[serde(default, deserialize_with = "deserialize_api_version")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A query job as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJob {
    pub id: String,
    pub state: JobState,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub number_records_processed: i64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One page of query job results.
#[derive(Debug, Clone)]
pub struct QueryResultsPage {
    /// CSV, header line included.
    pub csv: bytes::Bytes,
    pub row_count: usize,
    /// Locator of the next page; `None` on the last page.
    pub locator: Option<String>,
}

// =============================================================================
// Result Types
// =============================================================================

/// A row the job wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessfulRecord {
    /// `sf__Id`
    pub id: String,
    /// `sf__Created`: inserted rather than updated.
    pub created: bool,
    /// The row as uploaded.
    pub record: Record,
}

/// A row the job rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    /// `sf__Id`, when the row targeted an existing record.
    pub id: Option<String>,
    /// `sf__Error`
    pub error: String,
    pub record: Record,
}

/// The three disjoint result sets of a terminal job.
///
/// Each row keeps the uploaded columns, so `Id` or the external id
/// correlates it back to the input.
#[derive(Debug, Clone)]
pub struct JobResults {
    pub job: Job,
    pub successful: Vec<SuccessfulRecord>,
    pub failed: Vec<FailedRecord>,
    /// Rows never processed, e.g. because the job was aborted.
    pub unprocessed: Vec<Record>,
}

impl JobResults {
    pub fn is_success(&self) -> bool {
        self.job.state.is_success() && self.failed.is_empty() && self.unprocessed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.unprocessed.len()
    }
}

// =============================================================================
// Options
// =============================================================================

/// How to wait for a job to reach a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up waiting after this long. The remote job keeps running.
    pub timeout: Option<Duration>,
}

impl PollOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

/// Options for a bulk submission.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Rows per job.
    pub batch_size: usize,
    /// Poll every job to a terminal state before returning.
    pub wait_for_results: bool,
    /// Forwarded as the job's `assignmentRuleId`.
    pub assignment_rule_id: Option<String>,
    /// Required for upserts.
    pub external_id_field: Option<String>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: BULK_CEILING,
            wait_for_results: false,
            assignment_rule_id: None,
            external_id_field: None,
        }
    }
}

impl BulkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn wait_for_results(mut self, wait: bool) -> Self {
        self.wait_for_results = wait;
        self
    }

    pub fn with_assignment_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.assignment_rule_id = Some(rule_id.into());
        self
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }
}
