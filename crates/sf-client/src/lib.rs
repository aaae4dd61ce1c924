//! # forcelink-client
//!
//! Core plumbing shared by every forcelink API surface.
//!
//! - Authenticated dispatch with a single refresh-and-retry on 401
//! - Bounded retry of idempotent reads on transient transport failures
//! - Lazy, cached session credentials behind a pluggable [`TokenSource`]
//! - Dynamic [`Record`]s and a schema-driven row codec for JSON and CSV
//! - Order-preserving record batching
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │           (forcelink-rest, forcelink-bulk)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SalesforceClient                          │
//! │  - Resolves paths against the credential's instance URL     │
//! │  - Adds the bearer token, refreshes once on 401             │
//! │  - Typed JSON helpers (get_json, post_json, ...)            │
//! └─────────────────────────────────────────────────────────────┘
//!                     │                         │
//!                     ▼                         ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │          SfHttpClient         │ │        AuthManager        │
//! │  - Pooled reqwest transport   │ │  - Cached Credential      │
//! │  - GET retry with backoff     │ │  - Single-flight refresh  │
//! │  - Remote error mapping       │ │  - TokenSource seam       │
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forcelink_client::{AuthManager, ClientConfig, SalesforceClient, StaticToken};
//!
//! let auth = Arc::new(AuthManager::new(Arc::new(StaticToken::new(
//!     "00D...",
//!     "https://example.my.salesforce.com",
//! ))));
//! let client = SalesforceClient::new(ClientConfig::builder().build()?, auth)?;
//!
//! let limits: serde_json::Value = client.get_json("limits").await?;
//! ```

mod auth;
pub mod batch;
mod client;
pub mod codec;
mod config;
mod error;
mod record;
mod request;
mod response;
mod retry;
mod salesforce_client;
pub mod security;

pub use auth::{AuthManager, Credential, StaticToken, TokenSource};
pub use batch::{split, split_by_size, Chunk};
pub use client::SfHttpClient;
pub use codec::{FieldKind, FieldSpec, Row, RowSchema};
pub use config::{
    ClientConfig, ClientConfigBuilder, BULK_BATCH_CEILING, BULK_BYTES_CEILING,
    COLLECTIONS_BATCH_CEILING, MAX_CONCURRENCY,
};
pub use error::{Error, ErrorKind, Result};
pub use record::{FieldValue, Record};
pub use request::{RequestBody, RequestBuilder, RequestMethod, RequestOptions};
pub use response::{sanitize_error_message, Response};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use salesforce_client::SalesforceClient;

/// Default Salesforce API version
pub const DEFAULT_API_VERSION: &str = "64.0";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("forcelink/", env!("CARGO_PKG_VERSION"));
