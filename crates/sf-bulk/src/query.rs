use async_trait::async_trait;
use tracing::info;

use forcelink_rest::{Page, PageSource};

use crate::client::BulkApiClient;
use crate::error::{Error, ErrorKind, Result};
use crate::poll::wait_for_job;
use crate::types::{CreateQueryJobRequest, PollOptions, QueryJob};

/// Pages of a Bulk API 2.0 query job.
///
/// The first fetch creates the job and waits for it to complete; every
/// fetch then downloads one CSV page, continued through `Sforce-Locator`.
#[derive(Debug, Clone)]
pub struct BulkQueryPageSource {
    api: BulkApiClient,
    soql: String,
    poll: PollOptions,
    include_deleted: bool,
    max_records: Option<usize>,
    job_id: Option<String>,
}

impl BulkQueryPageSource {
    pub fn new(api: BulkApiClient, soql: impl Into<String>, poll: PollOptions) -> Self {
        Self {
            api,
            soql: soql.into(),
            poll,
            include_deleted: false,
            max_records: None,
            job_id: None,
        }
    }

    /// Include deleted and archived records.
    pub fn with_query_all(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Rows per page.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// The query job, once created.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    async fn start(&self) -> Result<String> {
        let mut request = CreateQueryJobRequest::new(self.soql.as_str());
        if self.include_deleted {
            request = request.with_query_all();
        }

        let job = self.api.create_query_job(&request).await?;
        info!(job_id = %job.id, "Query job created");

        let done = wait_for_job(
            &job.id,
            &self.poll,
            || self.api.get_query_job(&job.id),
            |job: &QueryJob| job.state,
        )
        .await?;

        if !done.state.is_success() {
            return Err(Error::new(ErrorKind::Job {
                job_id: done.id,
                state: done.state,
                message: done.error_message.unwrap_or_default(),
            }));
        }
        Ok(job.id)
    }
}

#[async_trait]
impl PageSource for BulkQueryPageSource {
    async fn fetch(&mut self, cursor: Option<&str>) -> forcelink_client::Result<Page> {
        let job_id = match &self.job_id {
            Some(id) => id.clone(),
            None => {
                let id = self.start().await?;
                self.job_id = Some(id.clone());
                id
            }
        };

        let page = self
            .api
            .get_query_results(&job_id, cursor, self.max_records)
            .await?;
        Ok(Page::csv(page.csv, page.row_count, page.locator))
    }
}
