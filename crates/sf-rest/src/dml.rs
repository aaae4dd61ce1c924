//! Batched DML over SObject Collections and Composite.
//!
//! [`BatchDmlExecutor`] cuts a record set into protocol-legal chunks,
//! dispatches them (concurrently, up to the configured degree) and places
//! every per-record result back at its input position. A failed call does
//! not stop its siblings; its records come back failed and the call is
//! listed in [`BatchOutcome::chunk_errors`].
//!
//! Collections sends one call per chunk. Composite sends one collections
//! subrequest per chunk with reference id `refChunk{n}`; without
//! `all_or_none` up to [`COMPOSITE_SUBREQUEST_CEILING`] of them share a call.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::ops::Range;
use tracing::{debug, instrument, warn};

use forcelink_client::batch::{
    check_batch_size, split, Chunk, COLLECTIONS_CEILING, COMPOSITE_SUBREQUEST_CEILING,
};
use forcelink_client::security::{soql, url as url_security};
use forcelink_client::{Record, RequestBuilder, RequestMethod, Row, SalesforceClient};

use crate::collections::{typed_record, CollectionRequest, CollectionResult};
use crate::composite::{CompositeRequest, CompositeResponse, CompositeSubrequest, CompositeSubresponse};
use crate::error::{Error, Result};
use crate::sobject::{BatchOutcome, ChunkError, DmlError, DmlOperation, DmlResult};

/// Which multi-record protocol carries the chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlProtocol {
    /// One SObject Collections call per chunk. Records succeed or fail
    /// individually.
    Collections,
    /// Composite calls of chunk subrequests. With `all_or_none` each chunk
    /// travels in its own call and rolls back as a unit; otherwise up to 25
    /// chunks share a call.
    Composite { all_or_none: bool },
}

/// What to write and how.
#[derive(Debug, Clone)]
pub struct DmlRequest {
    pub object: String,
    pub operation: DmlOperation,
    /// Required for upserts.
    pub external_id_field: Option<String>,
    /// Records per chunk, `1..=200`.
    pub batch_size: usize,
    pub protocol: DmlProtocol,
}

impl DmlRequest {
    pub fn new(object: impl Into<String>, operation: DmlOperation) -> Self {
        Self {
            object: object.into(),
            operation,
            external_id_field: None,
            batch_size: COLLECTIONS_CEILING,
            protocol: DmlProtocol::Collections,
        }
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_protocol(mut self, protocol: DmlProtocol) -> Self {
        self.protocol = protocol;
        self
    }
}

/// Runs batched insert/update/upsert/delete calls.
#[derive(Debug, Clone)]
pub struct BatchDmlExecutor {
    client: SalesforceClient,
}

impl BatchDmlExecutor {
    pub fn new(client: SalesforceClient) -> Self {
        Self { client }
    }

    /// Write `records` and return one result per record, in input order.
    ///
    /// Every record is validated before the first request is sent.
    #[instrument(
        skip(self, request, records),
        fields(object = %request.object, operation = %request.operation, records = records.len())
    )]
    pub async fn execute<T: Row>(&self, request: &DmlRequest, records: &[T]) -> Result<BatchOutcome> {
        let prepared = prepare(request, records)?;
        let chunks = split(&prepared, request.batch_size, COLLECTIONS_CEILING)?;

        let calls: Vec<Vec<Chunk<'_, Record>>> = match request.protocol {
            DmlProtocol::Collections => chunks.into_iter().map(|chunk| vec![chunk]).collect(),
            DmlProtocol::Composite { all_or_none: true } => {
                chunks.into_iter().map(|chunk| vec![chunk]).collect()
            }
            DmlProtocol::Composite { all_or_none: false } => chunks
                .chunks(COMPOSITE_SUBREQUEST_CEILING)
                .map(<[_]>::to_vec)
                .collect(),
        };

        let concurrency = self.client.config().max_concurrency.max(1);
        debug!(calls = calls.len(), concurrency, "Dispatching DML");

        let mut completed: Vec<_> = stream::iter(calls.iter().enumerate().map(
            |(index, call)| async move {
                let range = call_range(call);
                (index, range, self.dispatch(request, call).await)
            },
        ))
        .buffer_unordered(concurrency)
        .collect()
        .await;
        completed.sort_by_key(|(index, _, _)| *index);

        let mut slots: Vec<Option<DmlResult>> = vec![None; prepared.len()];
        let mut chunk_errors = Vec::new();

        for (index, range, outcome) in completed {
            match outcome {
                Ok(results) => {
                    for result in results {
                        if let Some(slot) = slots.get_mut(result.original_index) {
                            *slot = Some(result);
                        }
                    }
                }
                Err(error) => {
                    warn!(call = index, error = %error, "DML call failed");
                    let record_error = DmlError::from_client_error(&error.kind);
                    for i in range.clone() {
                        slots[i] = Some(DmlResult::failed(i, vec![record_error.clone()]));
                    }
                    chunk_errors.push(ChunkError { index, range, error });
                }
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| {
                    DmlResult::failed(i, vec![DmlError::new("NO_RESULT", "no result returned for record")])
                })
            })
            .collect();

        Ok(BatchOutcome {
            results,
            chunk_errors,
        })
    }

    async fn dispatch(
        &self,
        request: &DmlRequest,
        call: &[Chunk<'_, Record>],
    ) -> forcelink_client::Result<Vec<DmlResult>> {
        match request.protocol {
            DmlProtocol::Collections => {
                let mut results = Vec::new();
                for chunk in call {
                    results.extend(self.send_collection(request, chunk).await?);
                }
                Ok(results)
            }
            DmlProtocol::Composite { all_or_none } => {
                self.send_composite(request, call, all_or_none).await
            }
        }
    }

    async fn send_collection(
        &self,
        request: &DmlRequest,
        chunk: &Chunk<'_, Record>,
    ) -> forcelink_client::Result<Vec<DmlResult>> {
        let call = collection_call(request, chunk.records, false)?;
        let mut builder = RequestBuilder::new(call.method, call.path);
        if let Some(body) = call.body {
            builder = builder.json_value(body);
        }

        let results: Vec<CollectionResult> = self.client.execute_json(builder).await?;
        align(chunk, results)
    }

    async fn send_composite(
        &self,
        request: &DmlRequest,
        call: &[Chunk<'_, Record>],
        all_or_none: bool,
    ) -> forcelink_client::Result<Vec<DmlResult>> {
        let base = format!("/services/data/v{}", self.client.api_version());
        let mut subrequests = Vec::with_capacity(call.len());
        for chunk in call {
            let sub = collection_call(request, chunk.records, all_or_none)?;
            subrequests.push(CompositeSubrequest {
                method: sub.method.to_string(),
                url: format!("{base}/{}", sub.path),
                reference_id: reference_id(chunk.index),
                body: sub.body,
            });
        }

        let body = CompositeRequest {
            all_or_none,
            collate_subrequests: false,
            subrequests,
        };
        let response: CompositeResponse = self.client.post_json("composite", &body).await?;

        let mut results = Vec::new();
        for chunk in call {
            let reference = reference_id(chunk.index);
            match response.find(&reference) {
                Some(sub) if sub.is_success() => {
                    let parsed: Vec<CollectionResult> = serde_json::from_value(sub.body.clone())?;
                    results.extend(align(chunk, parsed)?);
                }
                Some(sub) => {
                    debug!(reference = %reference, status = sub.http_status_code, "Subrequest failed");
                    let errors = subrequest_errors(sub);
                    results.extend(chunk.range().map(|i| DmlResult::failed(i, errors.clone())));
                }
                None => {
                    return Err(forcelink_client::Error::new(
                        forcelink_client::ErrorKind::Other(format!(
                            "composite response has no entry for {reference}"
                        )),
                    ))
                }
            }
        }
        Ok(results)
    }
}

/// Composite reference id for a chunk.
pub fn reference_id(chunk_index: usize) -> String {
    format!("refChunk{chunk_index}")
}

struct CollectionCall {
    method: RequestMethod,
    /// Relative to `/services/data/v{version}/`.
    path: String,
    body: Option<Value>,
}

fn collection_call(
    request: &DmlRequest,
    records: &[Record],
    all_or_none: bool,
) -> forcelink_client::Result<CollectionCall> {
    if request.operation == DmlOperation::Delete {
        let ids: Vec<&str> = records.iter().filter_map(Record::id).collect();
        return Ok(CollectionCall {
            method: RequestMethod::Delete,
            path: format!(
                "composite/sobjects?ids={}&allOrNone={all_or_none}",
                ids.join(",")
            ),
            body: None,
        });
    }

    let body = serde_json::to_value(CollectionRequest {
        all_or_none,
        records: records
            .iter()
            .map(|record| typed_record(&request.object, record))
            .collect(),
    })?;

    let (method, path) = match (request.operation, request.external_id_field.as_deref()) {
        (DmlOperation::Insert, _) => (RequestMethod::Post, "composite/sobjects".to_string()),
        (DmlOperation::Upsert, Some(field)) => (
            RequestMethod::Patch,
            format!("composite/sobjects/{}/{field}", request.object),
        ),
        _ => (RequestMethod::Patch, "composite/sobjects".to_string()),
    };

    Ok(CollectionCall {
        method,
        path,
        body: Some(body),
    })
}

/// Validate the request and every record, before any I/O.
fn prepare<T: Row>(request: &DmlRequest, records: &[T]) -> Result<Vec<Record>> {
    if !soql::is_safe_sobject_name(&request.object) {
        return Err(Error::validation(format!(
            "invalid sObject name '{}'",
            request.object
        )));
    }
    check_batch_size(request.batch_size, COLLECTIONS_CEILING)?;

    let external_id = match request.operation {
        DmlOperation::Upsert => {
            let field = request
                .external_id_field
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .ok_or_else(|| Error::validation("upsert requires an external id field"))?;
            if !soql::is_safe_sobject_name(field) {
                return Err(Error::validation(format!(
                    "invalid external id field '{field}'"
                )));
            }
            Some(field)
        }
        _ => None,
    };

    records
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let record = row.to_record();
            if request.operation.requires_id() {
                match record.id() {
                    Some(id) if url_security::is_valid_salesforce_id(id) => {}
                    Some(id) => {
                        return Err(Error::validation(format!(
                            "record {i} has an invalid Id '{id}'"
                        )))
                    }
                    None => {
                        return Err(Error::validation(format!(
                            "record {i} has no Id, required for {}",
                            request.operation
                        )))
                    }
                }
            }
            if let Some(field) = external_id {
                if !record.has_value(field) {
                    return Err(Error::validation(format!(
                        "record {i} has no value for external id field '{field}'"
                    )));
                }
            }
            Ok(record)
        })
        .collect()
}

fn call_range(call: &[Chunk<'_, Record>]) -> Range<usize> {
    match (call.first(), call.last()) {
        (Some(first), Some(last)) => first.offset..last.range().end,
        _ => 0..0,
    }
}

/// Attach input positions to a chunk's results, which come back in request order.
fn align(
    chunk: &Chunk<'_, Record>,
    results: Vec<CollectionResult>,
) -> forcelink_client::Result<Vec<DmlResult>> {
    if results.len() != chunk.len() {
        return Err(forcelink_client::Error::new(
            forcelink_client::ErrorKind::Other(format!(
                "chunk {} sent {} records but got {} results",
                chunk.index,
                chunk.len(),
                results.len()
            )),
        ));
    }
    Ok(results
        .into_iter()
        .zip(chunk.range())
        .map(|(result, index)| result.into_dml_result(index))
        .collect())
}

fn subrequest_errors(sub: &CompositeSubresponse) -> Vec<DmlError> {
    serde_json::from_value::<Vec<DmlError>>(sub.body.clone()).unwrap_or_else(|_| {
        vec![DmlError::new(
            format!("HTTP_{}", sub.http_status_code),
            forcelink_client::sanitize_error_message(&sub.body.to_string()),
        )]
    })
}
