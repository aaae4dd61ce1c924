//! The `Salesforce` session: one credential, one config, every protocol.

use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use forcelink_auth::{ClientCredentialsFlow, Creds};
use forcelink_bulk::{BulkJobOrchestrator, BulkOptions, JobResults};
use forcelink_client::{
    AuthManager, ClientConfig, RequestMethod, RequestOptions, Response, Row, SalesforceClient,
    TokenSource,
};
use forcelink_rest::{
    BatchOutcome, DmlRequest, DmlResult, QueryIterator, SalesforceRestClient, SoqlQuery,
};

use crate::error::Result;

/// A Salesforce session.
///
/// Cheap to clone; clones share the credential, connection pool and
/// configuration. Creating a session performs no I/O: the first operation
/// acquires the access token, and a rejected token is refreshed once and
/// the request retried.
///
/// # Example
///
/// ```rust,ignore
/// use forcelink::{ClientConfig, Creds, Record, Salesforce};
///
/// let sf = Salesforce::new(Creds::from_env()?, ClientConfig::default())?;
///
/// let acme = Record::new().with("Name", "Acme");
/// let result = sf.insert_one("Account", &acme).await?;
///
/// let rows: Vec<Record> = sf.query("SELECT Id, Name FROM Account").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Salesforce {
    client: SalesforceClient,
    rest: SalesforceRestClient,
    bulk: BulkJobOrchestrator,
}

impl Salesforce {
    /// Session authenticated with the OAuth client-credentials flow.
    pub fn new(creds: Creds, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let mut flow = ClientCredentialsFlow::new(creds)?;
        if let Some(http_client) = &config.http_client {
            flow = flow.with_http_client(http_client.clone());
        }
        Self::with_token_source(Arc::new(flow), config)
    }

    /// Session over any token source.
    pub fn with_token_source(source: Arc<dyn TokenSource>, config: ClientConfig) -> Result<Self> {
        let auth = Arc::new(AuthManager::new(source));
        let client = SalesforceClient::new(config, auth)?;
        Ok(Self {
            rest: SalesforceRestClient::new(client.clone()),
            bulk: BulkJobOrchestrator::new(client.clone()),
            client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    /// Current access token, acquiring one on first use.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.client.access_token().await?)
    }

    pub async fn instance_url(&self) -> Result<String> {
        Ok(self.client.instance_url().await?)
    }

    /// The request dispatcher.
    pub fn client(&self) -> &SalesforceClient {
        &self.client
    }

    pub fn rest(&self) -> &SalesforceRestClient {
        &self.rest
    }

    pub fn bulk(&self) -> &BulkJobOrchestrator {
        &self.bulk
    }

    /// Issue an arbitrary API request.
    ///
    /// Paths under `/services/` hang off the instance root; other paths are
    /// relative to `/services/data/v{version}/`. A 304 is returned as a
    /// normal response.
    #[instrument(skip(self, body, options))]
    pub async fn do_request(
        &self,
        method: RequestMethod,
        path: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<Response> {
        Ok(self.client.do_request(method, path, body, options).await?)
    }

    // =========================================================================
    // Single record
    // =========================================================================

    pub async fn insert_one<T: Row>(&self, object: &str, record: &T) -> Result<DmlResult> {
        Ok(self.rest.insert_one(object, record).await?)
    }

    /// The record must carry `Id`.
    pub async fn update_one<T: Row>(&self, object: &str, record: &T) -> Result<DmlResult> {
        Ok(self.rest.update_one(object, record).await?)
    }

    /// The record must carry a value for `external_id_field`.
    pub async fn upsert_one<T: Row>(
        &self,
        object: &str,
        external_id_field: &str,
        record: &T,
    ) -> Result<DmlResult> {
        Ok(self.rest.upsert_one(object, external_id_field, record).await?)
    }

    pub async fn delete_one<T: Row>(&self, object: &str, record: &T) -> Result<DmlResult> {
        Ok(self.rest.delete_one(object, record).await?)
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Run a batched DML request with an explicit protocol.
    pub async fn execute_dml<T: Row>(
        &self,
        request: &DmlRequest,
        records: &[T],
    ) -> Result<BatchOutcome> {
        Ok(self.rest.executor().execute(request, records).await?)
    }

    pub async fn insert_collection<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        Ok(self.rest.insert_collection(object, records, batch_size).await?)
    }

    pub async fn update_collection<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        Ok(self.rest.update_collection(object, records, batch_size).await?)
    }

    pub async fn upsert_collection<T: Row>(
        &self,
        object: &str,
        external_id_field: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        Ok(self
            .rest
            .upsert_collection(object, external_id_field, records, batch_size)
            .await?)
    }

    pub async fn delete_collection<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        Ok(self.rest.delete_collection(object, records, batch_size).await?)
    }

    // =========================================================================
    // Composite
    // =========================================================================

    pub async fn insert_composite<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        Ok(self
            .rest
            .insert_composite(object, records, batch_size, all_or_none)
            .await?)
    }

    pub async fn update_composite<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        Ok(self
            .rest
            .update_composite(object, records, batch_size, all_or_none)
            .await?)
    }

    pub async fn upsert_composite<T: Row>(
        &self,
        object: &str,
        external_id_field: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        Ok(self
            .rest
            .upsert_composite(object, external_id_field, records, batch_size, all_or_none)
            .await?)
    }

    pub async fn delete_composite<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        Ok(self
            .rest
            .delete_composite(object, records, batch_size, all_or_none)
            .await?)
    }

    // =========================================================================
    // Bulk API 2.0
    // =========================================================================

    /// Returns one job id per chunk, in chunk order.
    pub async fn insert_bulk<T: Row>(
        &self,
        object: &str,
        records: &[T],
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.insert_bulk(object, records, options).await?)
    }

    pub async fn update_bulk<T: Row>(
        &self,
        object: &str,
        records: &[T],
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.update_bulk(object, records, options).await?)
    }

    pub async fn upsert_bulk<T: Row>(
        &self,
        object: &str,
        records: &[T],
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.upsert_bulk(object, records, options).await?)
    }

    pub async fn delete_bulk<T: Row>(
        &self,
        object: &str,
        records: &[T],
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.delete_bulk(object, records, options).await?)
    }

    /// Upload pre-built CSV; the first line is the header.
    pub async fn insert_bulk_csv(
        &self,
        object: &str,
        reader: impl Read,
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.insert_bulk_csv(object, reader, options).await?)
    }

    pub async fn update_bulk_csv(
        &self,
        object: &str,
        reader: impl Read,
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.update_bulk_csv(object, reader, options).await?)
    }

    pub async fn upsert_bulk_csv(
        &self,
        object: &str,
        reader: impl Read,
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.upsert_bulk_csv(object, reader, options).await?)
    }

    pub async fn delete_bulk_csv(
        &self,
        object: &str,
        reader: impl Read,
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        Ok(self.bulk.delete_bulk_csv(object, reader, options).await?)
    }

    /// Job status plus its successful, failed and unprocessed rows.
    ///
    /// Fails with a state error while the job is still running.
    pub async fn get_job_results(&self, job_id: &str) -> Result<JobResults> {
        Ok(self.bulk.get_job_results(job_id).await?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn query<T: Row>(&self, soql: &str) -> Result<Vec<T>> {
        Ok(self.rest.query(soql).await?)
    }

    pub async fn query_all<T: Row>(&self, soql: &str) -> Result<Vec<T>> {
        Ok(self.rest.query_all(soql).await?)
    }

    pub async fn query_struct<Q: SoqlQuery + ?Sized, T: Row>(&self, query: &Q) -> Result<Vec<T>> {
        Ok(self.rest.query_struct(query).await?)
    }

    /// Paged REST query; nothing is fetched until the first `next()`.
    pub fn query_iter(&self, soql: &str) -> QueryIterator {
        self.rest.query_iter(soql)
    }

    /// Paged Bulk API 2.0 query. The first `next()` creates the job and
    /// waits for it.
    pub fn query_bulk_iter(&self, soql: &str) -> QueryIterator {
        self.bulk.query_bulk_iter(soql)
    }

    /// Stream a bulk query's CSV into `writer`, header once. Returns the
    /// number of data rows written.
    pub async fn query_bulk_export(&self, soql: &str, writer: impl Write) -> Result<usize> {
        Ok(self.bulk.query_bulk_export(soql, writer).await?)
    }
}
