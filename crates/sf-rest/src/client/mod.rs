//! Salesforce REST client.
//!
//! Wraps the shared [`SalesforceClient`] dispatcher with typed front-ends
//! for single-record CRUD, batched DML over Collections and Composite, and
//! SOQL queries.

use forcelink_client::SalesforceClient;

use crate::dml::BatchDmlExecutor;

mod collections;
mod composite;
mod crud;
mod query;

pub use query::RestPageSource;

/// Salesforce REST API client.
///
/// # Example
///
/// ```rust,ignore
/// use forcelink_client::Record;
/// use forcelink_rest::SalesforceRestClient;
///
/// let rest = SalesforceRestClient::new(client);
///
/// let created = rest
///     .insert_one("Account", &Record::new().with("Name", "Acme"))
///     .await?;
///
/// let outcome = rest.update_collection("Account", &records, 200).await?;
/// for failed in outcome.failures() {
///     eprintln!("record {} failed: {:?}", failed.original_index, failed.errors);
/// }
///
/// let accounts: Vec<Record> = rest.query("SELECT Id, Name FROM Account").await?;
/// ```
#[derive(Debug, Clone)]
pub struct SalesforceRestClient {
    client: SalesforceClient,
    dml: BatchDmlExecutor,
}

impl SalesforceRestClient {
    /// Create a REST client on top of a dispatcher. No I/O happens here.
    pub fn new(client: SalesforceClient) -> Self {
        let dml = BatchDmlExecutor::new(client.clone());
        Self { client, dml }
    }

    /// Get the underlying dispatcher.
    pub fn inner(&self) -> &SalesforceClient {
        &self.client
    }

    /// The batch executor behind the collection and composite front-ends.
    pub fn executor(&self) -> &BatchDmlExecutor {
        &self.dml
    }

    pub fn api_version(&self) -> &str {
        self.client.api_version()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::SalesforceRestClient;
    use forcelink_client::{AuthManager, ClientConfig, SalesforceClient, StaticToken};
    use std::sync::Arc;
    use wiremock::MockServer;

    pub fn rest_client_for(server: &MockServer) -> SalesforceRestClient {
        let auth = Arc::new(AuthManager::new(Arc::new(StaticToken::new(
            "token",
            server.uri(),
        ))));
        let config = ClientConfig::builder().without_retry().build().unwrap();
        SalesforceRestClient::new(SalesforceClient::new(config, auth).unwrap())
    }
}
