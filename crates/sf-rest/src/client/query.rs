use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use forcelink_client::{Row, SalesforceClient};

use super::SalesforceRestClient;
use crate::error::Result;
use crate::query::{QueryOptions, QueryResult};
use crate::query_builder::{SoqlBuilder, SoqlQuery};
use crate::query_iter::{Page, PageSource, QueryIterator};

/// Pages of a REST SOQL query, followed through `nextRecordsUrl`.
#[derive(Debug, Clone)]
pub struct RestPageSource {
    client: SalesforceClient,
    soql: String,
    options: QueryOptions,
}

impl RestPageSource {
    pub fn new(client: SalesforceClient, soql: impl Into<String>, options: QueryOptions) -> Self {
        Self {
            client,
            soql: soql.into(),
            options,
        }
    }
}

#[async_trait]
impl PageSource for RestPageSource {
    async fn fetch(&mut self, cursor: Option<&str>) -> forcelink_client::Result<Page> {
        let request = match cursor {
            Some(next_url) => self.client.get(next_url),
            None => {
                let endpoint = if self.options.include_deleted {
                    "queryAll"
                } else {
                    "query"
                };
                self.client.get(endpoint).query("q", self.soql.as_str())
            }
        };
        let request = match self.options.batch_size {
            Some(size) => request.sforce_query_options(size),
            None => request,
        };

        let page: QueryResult<Value> = self.client.execute_json(request).await?;
        let next = if page.done {
            None
        } else {
            page.next_records_url
        };
        Ok(Page::json(page.records, next))
    }
}

impl SalesforceRestClient {
    /// Start a paged query. Nothing is fetched until the first
    /// [`QueryIterator::next`].
    pub fn query_iter(&self, soql: &str) -> QueryIterator {
        self.query_iter_with(soql, QueryOptions::default())
    }

    pub fn query_iter_with(&self, soql: &str, options: QueryOptions) -> QueryIterator {
        QueryIterator::new(RestPageSource::new(self.client.clone(), soql, options))
    }

    /// Run a query and decode every page.
    #[instrument(skip(self))]
    pub async fn query<T: Row>(&self, soql: &str) -> Result<Vec<T>> {
        self.query_iter(soql).collect_all().await
    }

    /// Like [`query`](Self::query), including deleted and archived records.
    #[instrument(skip(self))]
    pub async fn query_all<T: Row>(&self, soql: &str) -> Result<Vec<T>> {
        let options = QueryOptions {
            include_deleted: true,
            ..QueryOptions::default()
        };
        self.query_iter_with(soql, options).collect_all().await
    }

    /// Build SOQL from a query description, then run it.
    pub async fn query_struct<Q: SoqlQuery + ?Sized, T: Row>(&self, query: &Q) -> Result<Vec<T>> {
        let soql = SoqlBuilder::build(query)?;
        self.query(&soql).await
    }
}
