//! Bulk job orchestration: submit, upload, close, poll and fetch results.
//!
//! In-memory records are CSV-encoded once, then cut into chunks bounded by
//! both the row ceiling and the byte ceiling. Every chunk becomes its own
//! job, so a large record set yields several job ids, in chunk order.
//! Results are not merged across jobs.

use std::io::{Read, Write};

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use forcelink_client::batch::split_by_size;
use forcelink_client::codec::{self, CsvRows};
use forcelink_client::security::{soql, url as url_security};
use forcelink_client::{Record, Row, SalesforceClient};
use forcelink_rest::{PageSource, QueryIterator};

use crate::client::BulkApiClient;
use crate::error::{Error, Result};
use crate::poll::wait_for_job;
use crate::query::BulkQueryPageSource;
use crate::types::*;

/// Runs Bulk API 2.0 ingest and query jobs end to end.
#[derive(Debug, Clone)]
pub struct BulkJobOrchestrator {
    api: BulkApiClient,
    poll: PollOptions,
    /// Row ceiling per job.
    max_rows: usize,
    /// CSV byte ceiling per job upload.
    max_bytes: usize,
}

impl BulkJobOrchestrator {
    pub fn new(client: SalesforceClient) -> Self {
        let config = client.config();
        let poll = PollOptions::from_config(config);
        let max_rows = config.bulk_batch_size_max;
        let max_bytes = config.bulk_max_bytes;
        Self {
            api: BulkApiClient::new(client),
            poll,
            max_rows,
            max_bytes,
        }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn api(&self) -> &BulkApiClient {
        &self.api
    }

    pub fn poll_options(&self) -> &PollOptions {
        &self.poll
    }

    // =========================================================================
    // Job lifecycle
    // =========================================================================

    /// Create an ingest job in `Open`.
    pub async fn submit(
        &self,
        object: &str,
        operation: BulkOperation,
        external_id_field: Option<&str>,
    ) -> Result<Job> {
        let mut options = BulkOptions::new();
        if let Some(field) = external_id_field {
            options = options.with_external_id_field(field);
        }
        let request = job_request(object, operation, &options)?;
        self.open(&request).await
    }

    /// Upload one CSV chunk (header line included). The job must be `Open`.
    pub async fn upload(&self, job: &Job, csv: impl Into<Bytes>) -> Result<()> {
        if job.state != JobState::Open {
            return Err(Error::state(format!(
                "cannot upload to job {} in state {}",
                job.id, job.state
            )));
        }
        self.api.upload_job_data(&job.id, csv).await
    }

    /// Signal that no more data follows. `job` takes the server's new state.
    pub async fn close(&self, job: &mut Job) -> Result<()> {
        if job.state != JobState::Open {
            return Err(Error::state(format!(
                "cannot close job {} in state {}",
                job.id, job.state
            )));
        }
        *job = self.api.close_ingest_job(&job.id).await?;
        info!(job_id = %job.id, state = %job.state, "Job closed");
        Ok(())
    }

    /// Wait until the job is `JobComplete`, `Failed` or `Aborted`.
    pub async fn poll(&self, job_id: &str) -> Result<Job> {
        self.poll_with(job_id, &self.poll).await
    }

    #[instrument(skip(self, options))]
    pub async fn poll_with(&self, job_id: &str, options: &PollOptions) -> Result<Job> {
        wait_for_job(
            job_id,
            options,
            || self.api.get_ingest_job(job_id),
            |job: &Job| job.state,
        )
        .await
    }

    /// Download and decode the three result sets of a terminal job.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn fetch_results(&self, job: &Job) -> Result<JobResults> {
        if !job.state.is_terminal() {
            return Err(Error::state(format!(
                "results of job {} are not available in state {}",
                job.id, job.state
            )));
        }

        let (successful, failed, unprocessed) = futures::try_join!(
            self.api.get_successful_results(&job.id),
            self.api.get_failed_results(&job.id),
            self.api.get_unprocessed_records(&job.id),
        )?;

        let results = JobResults {
            job: job.clone(),
            successful: parse_successful(&successful)?,
            failed: parse_failed(&failed)?,
            unprocessed: codec::decode_csv::<Record>(&unprocessed, 0)?,
        };
        debug!(
            successful = results.successful.len(),
            failed = results.failed.len(),
            unprocessed = results.unprocessed.len(),
            "Fetched job results"
        );
        Ok(results)
    }

    /// Look the job up, then fetch its results.
    pub async fn get_job_results(&self, job_id: &str) -> Result<JobResults> {
        let job = self.api.get_ingest_job(job_id).await?;
        self.fetch_results(&job).await
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit records as one or more jobs and return their ids in chunk
    /// order.
    ///
    /// Every record is checked before the first job is created.
    #[instrument(skip(self, records, options), fields(records = records.len()))]
    pub async fn submit_records<T: Row>(
        &self,
        object: &str,
        operation: BulkOperation,
        records: &[T],
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        let request = job_request(object, operation, options)?;
        for (i, row) in records.iter().enumerate() {
            check_record(i, &row.to_record(), operation, options)?;
        }

        let rows = codec::encode_csv_rows(records)?;
        self.submit_rows(&request, &rows, options).await
    }

    /// Submit pre-built CSV (header line first) as one or more jobs.
    #[instrument(skip(self, reader, options))]
    pub async fn submit_csv(
        &self,
        object: &str,
        operation: BulkOperation,
        mut reader: impl Read,
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        let request = job_request(object, operation, options)?;

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let rows = CsvRows::parse(data)?;
        check_columns(&rows.columns()?, operation, options)?;

        self.submit_rows(&request, &rows, options).await
    }

    async fn submit_rows(
        &self,
        request: &CreateIngestJobRequest,
        rows: &CsvRows,
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        let header = rows.header();
        let budget = self.max_bytes.saturating_sub(header.len()).max(1);
        let indices: Vec<usize> = (0..rows.len()).collect();
        let chunks = split_by_size(&indices, options.batch_size, self.max_rows, budget, |_, &i| {
            rows.row_size(i)
        })?;

        let request = request.clone().with_line_ending(LineEnding::of(header));
        let mut job_ids: Vec<String> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let mut job = match self.open(&request).await {
                Ok(job) => job,
                Err(err) => return Err(err.submission(chunk.index, None, job_ids)),
            };
            let sent = match self.upload(&job, rows.chunk(chunk.range())).await {
                Ok(()) => self.close(&mut job).await,
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                if let Err(abort) = self.api.abort_ingest_job(&job.id).await {
                    warn!(job_id = %job.id, error = %abort, "Could not abort job after failed submission");
                }
                return Err(err.submission(chunk.index, Some(job.id), job_ids));
            }
            debug!(job_id = %job.id, chunk = chunk.index, rows = chunk.len(), bytes = chunk.byte_size, "Chunk submitted");
            job_ids.push(job.id);
        }

        if options.wait_for_results {
            for index in 0..job_ids.len() {
                if let Err(err) = self.poll(&job_ids[index]).await {
                    let job_id = job_ids[index].clone();
                    return Err(err.submission(index, Some(job_id), job_ids));
                }
            }
        }
        Ok(job_ids)
    }

    async fn open(&self, request: &CreateIngestJobRequest) -> Result<Job> {
        let job = self.api.create_ingest_job(request).await?;
        info!(job_id = %job.id, state = %job.state, object = %job.object, "Job created");
        Ok(job)
    }

    pub async fn insert_bulk<T: Row>(&self, object: &str, records: &[T], options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_records(object, BulkOperation::Insert, records, options).await
    }

    pub async fn update_bulk<T: Row>(&self, object: &str, records: &[T], options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_records(object, BulkOperation::Update, records, options).await
    }

    /// Requires `options.external_id_field`.
    pub async fn upsert_bulk<T: Row>(&self, object: &str, records: &[T], options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_records(object, BulkOperation::Upsert, records, options).await
    }

    pub async fn delete_bulk<T: Row>(&self, object: &str, records: &[T], options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_records(object, BulkOperation::Delete, records, options).await
    }

    pub async fn insert_bulk_csv(&self, object: &str, reader: impl Read, options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_csv(object, BulkOperation::Insert, reader, options).await
    }

    pub async fn update_bulk_csv(&self, object: &str, reader: impl Read, options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_csv(object, BulkOperation::Update, reader, options).await
    }

    pub async fn upsert_bulk_csv(&self, object: &str, reader: impl Read, options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_csv(object, BulkOperation::Upsert, reader, options).await
    }

    pub async fn delete_bulk_csv(&self, object: &str, reader: impl Read, options: &BulkOptions) -> Result<Vec<String>> {
        self.submit_csv(object, BulkOperation::Delete, reader, options).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Page through a bulk query. The job is created on the first
    /// [`QueryIterator::next`].
    pub fn query_bulk_iter(&self, soql: &str) -> QueryIterator {
        QueryIterator::new(BulkQueryPageSource::new(self.api.clone(), soql, self.poll))
    }

    /// Run a bulk query and write its CSV to `writer`, header line once.
    ///
    /// Returns the number of data rows written.
    #[instrument(skip(self, writer))]
    pub async fn query_bulk_export(&self, soql: &str, mut writer: impl Write) -> Result<usize> {
        let mut source = BulkQueryPageSource::new(self.api.clone(), soql, self.poll);
        let mut cursor: Option<String> = None;
        let mut rows = 0;

        loop {
            let page = source.fetch(cursor.as_deref()).await?;
            if let forcelink_rest::RawRows::Csv(data) = &page.rows {
                let body = if cursor.is_none() {
                    &data[..]
                } else {
                    without_header(data)
                };
                writer.write_all(body)?;
            }
            rows += page.row_count;

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        writer.flush()?;
        Ok(rows)
    }
}

/// Build and check a job request before any I/O.
fn job_request(
    object: &str,
    operation: BulkOperation,
    options: &BulkOptions,
) -> Result<CreateIngestJobRequest> {
    if !soql::is_safe_sobject_name(object) {
        return Err(Error::validation(format!("invalid sObject name '{object}'")));
    }

    let mut request = CreateIngestJobRequest::new(object, operation);
    if operation == BulkOperation::Upsert {
        let field = options
            .external_id_field
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::validation("upsert requires an external id field"))?;
        if !soql::is_safe_sobject_name(field) {
            return Err(Error::validation(format!("invalid external id field '{field}'")));
        }
        request = request.with_external_id_field(field);
    }
    if let Some(rule) = &options.assignment_rule_id {
        if !url_security::is_valid_salesforce_id(rule) {
            return Err(Error::validation(format!("invalid assignment rule id '{rule}'")));
        }
        request = request.with_assignment_rule(rule.as_str());
    }
    Ok(request)
}

fn check_record(index: usize, record: &Record, operation: BulkOperation, options: &BulkOptions) -> Result<()> {
    if operation.requires_id() {
        match record.id() {
            Some(id) if url_security::is_valid_salesforce_id(id) => {}
            Some(id) => {
                return Err(Error::validation(format!("record {index} has an invalid Id '{id}'")))
            }
            None => {
                return Err(Error::validation(format!(
                    "record {index} has no Id, required for {operation}"
                )))
            }
        }
    }
    if operation == BulkOperation::Upsert {
        if let Some(field) = options.external_id_field.as_deref() {
            if !record.has_value(field) {
                return Err(Error::validation(format!(
                    "record {index} has no value for external id field '{field}'"
                )));
            }
        }
    }
    Ok(())
}

fn check_columns(columns: &[String], operation: BulkOperation, options: &BulkOptions) -> Result<()> {
    let required = if operation.requires_id() {
        Some("Id")
    } else if operation == BulkOperation::Upsert {
        options.external_id_field.as_deref()
    } else {
        None
    };
    match required {
        Some(column) if !columns.iter().any(|c| c == column) => Err(Error::validation(format!(
            "CSV has no '{column}' column, required for {operation}"
        ))),
        _ => Ok(()),
    }
}

fn without_header(data: &[u8]) -> &[u8] {
    match data.iter().position(|&b| b == b'\n') {
        Some(end) => &data[end + 1..],
        None => &[],
    }
}

fn take_text(record: &mut Record, column: &str) -> Option<String> {
    record
        .remove(column)
        .and_then(|value| value.as_str().map(str::to_string))
}

fn parse_successful(data: &[u8]) -> Result<Vec<SuccessfulRecord>> {
    let rows: Vec<Record> = codec::decode_csv(data, 0)?;
    Ok(rows
        .into_iter()
        .map(|mut record| SuccessfulRecord {
            id: take_text(&mut record, "sf__Id").unwrap_or_default(),
            created: take_text(&mut record, "sf__Created")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            record,
        })
        .collect())
}

fn parse_failed(data: &[u8]) -> Result<Vec<FailedRecord>> {
    let rows: Vec<Record> = codec::decode_csv(data, 0)?;
    Ok(rows
        .into_iter()
        .map(|mut record| FailedRecord {
            id: take_text(&mut record, "sf__Id"),
            error: take_text(&mut record, "sf__Error").unwrap_or_default(),
            record,
        })
        .collect())
}
