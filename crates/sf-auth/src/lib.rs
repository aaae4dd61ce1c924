//! # forcelink-auth
//!
//! OAuth 2.0 client-credentials token transport for forcelink.
//!
//! ## Security
//!
//! - The consumer secret and access tokens are redacted in Debug output
//! - Tracing spans skip credential parameters
//! - The secret travels in the form body, never in a URL
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forcelink_auth::{ClientCredentialsFlow, Creds};
//! use forcelink_client::AuthManager;
//!
//! let flow = ClientCredentialsFlow::new(Creds::from_env()?)?;
//! let auth = Arc::new(AuthManager::new(Arc::new(flow)));
//! ```

mod credentials;
mod error;
mod oauth;

pub use credentials::Creds;
pub use error::{Error, ErrorKind, Result};
pub use oauth::{ClientCredentialsFlow, TokenResponse};
