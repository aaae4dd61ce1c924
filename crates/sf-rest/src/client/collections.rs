//! Batched DML over SObject Collections.
//!
//! Each chunk of up to 200 records is one call. Records succeed or fail
//! individually, and a failed call only fails its own chunk.

use forcelink_client::Row;

use super::SalesforceRestClient;
use crate::dml::DmlRequest;
use crate::error::Result;
use crate::sobject::{BatchOutcome, DmlOperation};

impl SalesforceRestClient {
    pub async fn insert_collection<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        let request = DmlRequest::new(object, DmlOperation::Insert).with_batch_size(batch_size);
        self.dml.execute(&request, records).await
    }

    /// Update records by `Id`.
    pub async fn update_collection<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        let request = DmlRequest::new(object, DmlOperation::Update).with_batch_size(batch_size);
        self.dml.execute(&request, records).await
    }

    /// Insert or update records keyed by `external_id_field`.
    pub async fn upsert_collection<T: Row>(
        &self,
        object: &str,
        external_id_field: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        let request = DmlRequest::new(object, DmlOperation::Upsert)
            .with_external_id_field(external_id_field)
            .with_batch_size(batch_size);
        self.dml.execute(&request, records).await
    }

    /// Delete records by `Id`.
    pub async fn delete_collection<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        let request = DmlRequest::new(object, DmlOperation::Delete).with_batch_size(batch_size);
        self.dml.execute(&request, records).await
    }
}
