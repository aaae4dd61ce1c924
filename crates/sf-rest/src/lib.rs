//! # forcelink-rest
//!
//! Salesforce REST surfaces built on the `forcelink-client` dispatcher.
//!
//! ## Features
//!
//! - **Single-record CRUD** - insert, update, upsert and delete one record
//! - **SObject Collections** - batched DML in chunks of up to 200 records
//! - **Composite** - up to 25 chunks per call, optionally all-or-none
//! - **SOQL building** - escaped, injection-safe queries from a description
//! - **Paged queries** - a pull-based iterator holding one page at a time
//!
//! Batched DML always returns one result per input record, in input order,
//! however the chunks were dispatched.
//!
//! ## Example
//!
//! ```rust,ignore
//! use forcelink_client::Record;
//! use forcelink_rest::{Condition, QuerySpec, SalesforceRestClient};
//!
//! let rest = SalesforceRestClient::new(client);
//!
//! let records: Vec<Record> = (0..500)
//!     .map(|i| Record::new().with("Name", format!("Account {i}")))
//!     .collect();
//! let outcome = rest.insert_collection("Account", &records, 200).await?;
//! assert_eq!(outcome.results.len(), 500);
//!
//! let spec = QuerySpec::new("Account")
//!     .columns(["Id", "Name"])
//!     .condition(Condition::like("Name", "Account"));
//! let accounts: Vec<Record> = rest.query_struct(&spec).await?;
//! ```

mod client;
mod collections;
mod composite;
mod dml;
mod error;
mod query;
mod query_builder;
mod query_iter;
mod sobject;

pub use client::{RestPageSource, SalesforceRestClient};

pub use collections::{CollectionRequest, CollectionResult};
pub use composite::{CompositeRequest, CompositeResponse, CompositeSubrequest, CompositeSubresponse};

pub use dml::{reference_id, BatchDmlExecutor, DmlProtocol, DmlRequest};
pub use sobject::{BatchOutcome, ChunkError, DmlError, DmlOperation, DmlResult};

pub use query::{QueryOptions, QueryResult};
pub use query_builder::{Condition, LikeMatch, Operator, QuerySpec, SoqlBuilder, SoqlQuery};
pub use query_iter::{Page, PageSource, QueryCursor, QueryIterator, RawRows};

pub use error::{Error, ErrorKind, Result};
