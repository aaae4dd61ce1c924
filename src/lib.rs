//! # forcelink
//!
//! Salesforce DML client with one surface over four write protocols:
//! single-record REST, sObject Collections, Composite and Bulk API 2.0,
//! plus paged SOQL queries over REST and Bulk.
//!
//! ## Security
//!
//! - Tokens and consumer secrets are redacted in Debug output
//! - Tracing spans skip credentials and payloads
//! - Remote error bodies are sanitized before they reach an error message
//!
//! ## Crates
//!
//! - **forcelink-client** - Dispatcher, config, retry, credential cache, row codec
//! - **forcelink-auth** - OAuth 2.0 client-credentials flow
//! - **forcelink-rest** - CRUD, Collections, Composite, SOQL builder, query iterator
//! - **forcelink-bulk** - Bulk API 2.0 ingest and query jobs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forcelink::{BulkOptions, ClientConfig, Creds, Record, Salesforce};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sf = Salesforce::new(Creds::from_env()?, ClientConfig::default())?;
//!
//!     let records: Vec<Record> = (0..500)
//!         .map(|n| Record::new().with("Name", format!("Account {n}")))
//!         .collect();
//!
//!     let outcome = sf.insert_collection("Account", &records, 200).await?;
//!     println!("{} failed", outcome.failures().count());
//!
//!     let jobs = sf
//!         .insert_bulk("Account", &records, &BulkOptions::new().wait_for_results(true))
//!         .await?;
//!     for job_id in jobs {
//!         let results = sf.get_job_results(&job_id).await?;
//!         println!("{job_id}: {} failed", results.failed.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "client")]
pub use forcelink_client as client;

#[cfg(feature = "auth")]
pub use forcelink_auth as auth;

#[cfg(feature = "rest")]
pub use forcelink_rest as rest;

#[cfg(feature = "bulk")]
pub use forcelink_bulk as bulk;

#[cfg(feature = "bulk")]
mod error;
#[cfg(feature = "bulk")]
mod salesforce;

#[cfg(feature = "bulk")]
pub use error::{Error, ErrorKind, Result};
#[cfg(feature = "bulk")]
pub use salesforce::Salesforce;

// Re-export commonly used types at the top level
#[cfg(feature = "client")]
pub use forcelink_client::{
    ClientConfig, FieldKind, FieldSpec, FieldValue, Record, RequestMethod, RequestOptions,
    Response, Row, RowSchema, SalesforceClient, StaticToken, TokenSource,
};

#[cfg(feature = "auth")]
pub use forcelink_auth::Creds;

#[cfg(feature = "rest")]
pub use forcelink_rest::{
    BatchOutcome, Condition, DmlOperation, DmlProtocol, DmlRequest, DmlResult, LikeMatch,
    Operator, QueryIterator, QuerySpec, SoqlBuilder, SoqlQuery,
};

#[cfg(feature = "bulk")]
pub use forcelink_bulk::{BulkOperation, BulkOptions, Job, JobResults, JobState, PollOptions};
