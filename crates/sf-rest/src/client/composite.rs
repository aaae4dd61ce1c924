//! Batched DML over the Composite API.
//!
//! Up to 25 chunks travel in one call. With `all_or_none` a failure in
//! any subrequest rolls back the whole call, and every record of that call
//! is reported failed.

use forcelink_client::Row;

use super::SalesforceRestClient;
use crate::dml::{DmlProtocol, DmlRequest};
use crate::error::Result;
use crate::sobject::{BatchOutcome, DmlOperation};

impl SalesforceRestClient {
    pub async fn insert_composite<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        self.composite(DmlRequest::new(object, DmlOperation::Insert), records, batch_size, all_or_none)
            .await
    }

    pub async fn update_composite<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        self.composite(DmlRequest::new(object, DmlOperation::Update), records, batch_size, all_or_none)
            .await
    }

    pub async fn upsert_composite<T: Row>(
        &self,
        object: &str,
        external_id_field: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        let request =
            DmlRequest::new(object, DmlOperation::Upsert).with_external_id_field(external_id_field);
        self.composite(request, records, batch_size, all_or_none).await
    }

    pub async fn delete_composite<T: Row>(
        &self,
        object: &str,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        self.composite(DmlRequest::new(object, DmlOperation::Delete), records, batch_size, all_or_none)
            .await
    }

    async fn composite<T: Row>(
        &self,
        request: DmlRequest,
        records: &[T],
        batch_size: usize,
        all_or_none: bool,
    ) -> Result<BatchOutcome> {
        let request = request
            .with_batch_size(batch_size)
            .with_protocol(DmlProtocol::Composite { all_or_none });
        self.dml.execute(&request, records).await
    }
}
