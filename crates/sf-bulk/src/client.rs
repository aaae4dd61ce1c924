//! Bulk API 2.0 endpoints.
//!
//! One method per remote call, no orchestration. Uploads and job creation
//! are never retried; status and result reads share the dispatcher's GET
//! retry.

use bytes::Bytes;
use tracing::{debug, instrument};

use forcelink_client::SalesforceClient;

use crate::error::Result;
use crate::types::*;

const INGEST: &str = "jobs/ingest";
const QUERY: &str = "jobs/query";

/// Raw Bulk API 2.0 client.
///
/// # Example
///
/// ```rust,ignore
/// use forcelink_bulk::{BulkApiClient, BulkOperation, CreateIngestJobRequest};
///
/// let api = BulkApiClient::new(client);
///
/// let job = api
///     .create_ingest_job(&CreateIngestJobRequest::new("Account", BulkOperation::Insert))
///     .await?;
/// api.upload_job_data(&job.id, "Name\nAcme\nGlobex\n").await?;
/// api.close_ingest_job(&job.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BulkApiClient {
    client: SalesforceClient,
}

impl BulkApiClient {
    pub fn new(client: SalesforceClient) -> Self {
        Self { client }
    }

    /// Get the underlying dispatcher.
    pub fn inner(&self) -> &SalesforceClient {
        &self.client
    }

    // =========================================================================
    // Ingest Job Operations
    // =========================================================================

    /// Create an ingest job. It starts `Open`.
    #[instrument(skip(self, request), fields(object = %request.object, operation = %request.operation))]
    pub async fn create_ingest_job(&self, request: &CreateIngestJobRequest) -> Result<Job> {
        Ok(self.client.post_json(INGEST, request).await?)
    }

    /// Upload one CSV payload to an open job.
    #[instrument(skip(self, csv))]
    pub async fn upload_job_data(&self, job_id: &str, csv: impl Into<Bytes>) -> Result<()> {
        let csv = csv.into();
        debug!(bytes = csv.len(), "Uploading job data");

        let request = self.client.put(&format!("{INGEST}/{job_id}/batches")).csv(csv);
        self.client.execute(request).await?;
        Ok(())
    }

    /// Mark upload complete; the server then queues the job.
    #[instrument(skip(self))]
    pub async fn close_ingest_job(&self, job_id: &str) -> Result<Job> {
        self.set_state(INGEST, job_id, JobState::UploadComplete).await
    }

    #[instrument(skip(self))]
    pub async fn abort_ingest_job(&self, job_id: &str) -> Result<Job> {
        self.set_state(INGEST, job_id, JobState::Aborted).await
    }

    #[instrument(skip(self))]
    pub async fn get_ingest_job(&self, job_id: &str) -> Result<Job> {
        Ok(self.client.get_json(&format!("{INGEST}/{job_id}")).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_ingest_job(&self, job_id: &str) -> Result<()> {
        self.client
            .execute(self.client.delete(&format!("{INGEST}/{job_id}")))
            .await?;
        Ok(())
    }

    /// Rows written, with `sf__Id` and `sf__Created` prepended.
    #[instrument(skip(self))]
    pub async fn get_successful_results(&self, job_id: &str) -> Result<Bytes> {
        self.get_csv(&format!("{INGEST}/{job_id}/successfulResults"))
            .await
    }

    /// Rows rejected, with `sf__Id` and `sf__Error` prepended.
    #[instrument(skip(self))]
    pub async fn get_failed_results(&self, job_id: &str) -> Result<Bytes> {
        self.get_csv(&format!("{INGEST}/{job_id}/failedResults"))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_unprocessed_records(&self, job_id: &str) -> Result<Bytes> {
        self.get_csv(&format!("{INGEST}/{job_id}/unprocessedrecords"))
            .await
    }

    // =========================================================================
    // Query Job Operations
    // =========================================================================

    #[instrument(skip(self, request))]
    pub async fn create_query_job(&self, request: &CreateQueryJobRequest) -> Result<QueryJob> {
        Ok(self.client.post_json(QUERY, request).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_query_job(&self, job_id: &str) -> Result<QueryJob> {
        Ok(self.client.get_json(&format!("{QUERY}/{job_id}")).await?)
    }

    #[instrument(skip(self))]
    pub async fn abort_query_job(&self, job_id: &str) -> Result<QueryJob> {
        self.set_state(QUERY, job_id, JobState::Aborted).await
    }

    #[instrument(skip(self))]
    pub async fn delete_query_job(&self, job_id: &str) -> Result<()> {
        self.client
            .execute(self.client.delete(&format!("{QUERY}/{job_id}")))
            .await?;
        Ok(())
    }

    /// One page of query results. Pass the previous page's locator to
    /// continue.
    #[instrument(skip(self))]
    pub async fn get_query_results(
        &self,
        job_id: &str,
        locator: Option<&str>,
        max_records: Option<usize>,
    ) -> Result<QueryResultsPage> {
        let mut request = self
            .client
            .get(&format!("{QUERY}/{job_id}/results"))
            .header("Accept", "text/csv");
        if let Some(locator) = locator {
            request = request.query("locator", locator);
        }
        if let Some(max) = max_records {
            request = request.query("maxRecords", max.to_string());
        }

        let response = self.client.execute(request).await?;
        let locator = response
            .sforce_locator()
            .filter(|l| !l.is_empty() && *l != "null")
            .map(str::to_string);
        let declared = response
            .header("Sforce-NumberOfRecords")
            .and_then(|n| n.parse::<usize>().ok());

        let csv = response.bytes().await?;
        let row_count = match declared {
            Some(n) => n,
            None => count_rows(&csv)?,
        };

        Ok(QueryResultsPage {
            csv,
            row_count,
            locator,
        })
    }

    async fn get_csv(&self, path: &str) -> Result<Bytes> {
        let request = self.client.get(path).header("Accept", "text/csv");
        Ok(self.client.execute(request).await?.bytes().await?)
    }

    async fn set_state<T: serde::de::DeserializeOwned>(
        &self,
        base: &str,
        job_id: &str,
        state: JobState,
    ) -> Result<T> {
        Ok(self
            .client
            .patch_json(&format!("{base}/{job_id}"), &UpdateJobStateRequest { state })
            .await?)
    }
}

/// Data rows in a CSV payload with a header line.
fn count_rows(data: &[u8]) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data);
    let mut record = csv::ByteRecord::new();
    let mut rows = 0;
    while reader.read_byte_record(&mut record)? {
        rows += 1;
    }
    Ok(rows)
}
