//! # forcelink-bulk
//!
//! Salesforce Bulk API 2.0 for large data loads and exports.
//!
//! ## Features
//!
//! - **Ingest jobs** - insert, update, upsert, delete and hard delete from
//!   records or pre-built CSV
//! - **Chunking** - one job per chunk, bounded by rows and CSV bytes
//! - **Job lifecycle** - submit, upload, close, poll with optional deadline
//! - **Results** - successful, failed and unprocessed rows, decoded
//! - **Bulk queries** - paged through `Sforce-Locator`, or exported as CSV
//!
//! ## Example
//!
//! ```rust,ignore
//! use forcelink_bulk::{BulkJobOrchestrator, BulkOptions};
//!
//! let bulk = BulkJobOrchestrator::new(client);
//!
//! let job_ids = bulk
//!     .insert_bulk("Contact", &contacts, &BulkOptions::new().wait_for_results(true))
//!     .await?;
//! for id in &job_ids {
//!     let results = bulk.get_job_results(id).await?;
//!     println!("{id}: {} failed", results.failed.len());
//! }
//!
//! let file = std::fs::File::create("contacts.csv")?;
//! bulk.query_bulk_export("SELECT Id, LastName FROM Contact", file).await?;
//! ```

mod client;
mod error;
mod orchestrator;
mod poll;
mod query;
mod types;

pub use client::BulkApiClient;
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::BulkJobOrchestrator;
pub use query::BulkQueryPageSource;
pub use types::*;
