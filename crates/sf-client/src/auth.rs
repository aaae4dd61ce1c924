//! Bearer credential ownership and refresh.
//!
//! [`AuthManager`] is the only holder of the live [`Credential`]. Callers get
//! clones; the cached value changes only inside the refresh region, which is
//! guarded by a `tokio::sync::Mutex` so at most one token exchange is in
//! flight at a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{Error, ErrorKind, Result};

/// A bearer token plus the instance it is valid for.
///
/// The access token is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    instance_url: String,
    expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl Credential {
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            expiry: None,
        }
    }

    /// Mark the credential as unusable after `expiry`.
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Instance URL without a trailing slash.
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Returns true once a known expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| Utc::now() >= expiry)
    }
}

/// Something that can exchange configuration for a fresh [`Credential`].
///
/// The OAuth client-credentials flow in `forcelink-auth` is the usual
/// implementation; tests and callers with their own token plumbing can
/// provide others.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire(&self) -> Result<Credential>;
}

/// A token source that always hands back the same credential.
#[derive(Debug, Clone)]
pub struct StaticToken(Credential);

impl StaticToken {
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self(Credential::new(access_token, instance_url))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn acquire(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }
}

/// Owns the session credential: lazy acquisition, caching and single-flight refresh.
pub struct AuthManager {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<Credential>>,
    acquisitions: AtomicU64,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("acquisitions", &self.acquisitions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create a manager. Nothing is fetched until the first [`credential`](Self::credential) call.
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Number of token exchanges performed so far.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Return the cached credential, acquiring one if none is cached or it expired.
    pub async fn credential(&self) -> Result<Credential> {
        let mut cached = self.cached.lock().await;
        if let Some(credential) = cached.as_ref().filter(|c| !c.is_expired()) {
            return Ok(credential.clone());
        }

        let fresh = self.acquire().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Replace a credential the server just rejected.
    ///
    /// If another caller already swapped the cached credential while this one
    /// waited for the lock, the newer credential is returned without a second
    /// exchange.
    #[instrument(skip(self, rejected))]
    pub async fn refresh(&self, rejected: &Credential) -> Result<Credential> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached
            .as_ref()
            .filter(|c| c.access_token != rejected.access_token && !c.is_expired())
        {
            debug!("Credential already refreshed by a concurrent caller");
            return Ok(current.clone());
        }

        warn!("Credential rejected, re-acquiring");
        *cached = None;
        let fresh = self.acquire().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached credential; the next call re-acquires.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn acquire(&self) -> Result<Credential> {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        match self.source.acquire().await {
            Ok(credential) => {
                debug!(instance_url = %credential.instance_url(), "Credential acquired");
                Ok(credential)
            }
            Err(err) if err.is_auth_error() => Err(err),
            Err(err) => Err(Error::with_source(
                ErrorKind::Authentication(format!("token acquisition failed: {err}")),
                err,
            )),
        }
    }
}
