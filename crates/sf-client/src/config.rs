//! Client configuration.
//!
//! Every option is a named field with a documented range. Ranges are checked
//! once in [`ClientConfigBuilder::build`], never per call.

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use std::time::Duration;

/// Largest record count per collections request or composite sub-request.
pub const COLLECTIONS_BATCH_CEILING: usize = 200;

/// Largest row count uploaded to one bulk ingest job.
pub const BULK_BATCH_CEILING: usize = 10_000;

/// Largest CSV payload (bytes) uploaded to one bulk ingest job.
pub const BULK_BYTES_CEILING: usize = 100_000_000;

/// Upper bound for concurrent chunk dispatch within one call.
pub const MAX_CONCURRENCY: usize = 25;

/// Configuration for the Salesforce client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API version without the leading `v` (e.g. `"64.0"`).
    pub api_version: String,
    /// Records per collections request / composite sub-request (1..=200).
    pub batch_size_max: usize,
    /// Rows per bulk ingest job (1..=10 000).
    pub bulk_batch_size_max: usize,
    /// CSV bytes per bulk ingest job (1..=100 000 000).
    pub bulk_max_bytes: usize,
    /// Advertise gzip/deflate on every request.
    pub compression_headers: bool,
    /// Chunks dispatched concurrently within one call (1..=25).
    pub max_concurrency: usize,
    /// Retry configuration for idempotent requests.
    pub retry: RetryConfig,
    /// Request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Pool idle timeout.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// User-Agent header value.
    pub user_agent: String,
    /// Whether to emit per-request tracing events.
    pub enable_tracing: bool,
    /// Interval between bulk job status checks.
    pub poll_interval: Duration,
    /// Optional deadline for waiting on a bulk job.
    pub poll_timeout: Option<Duration>,
    /// Caller-supplied transport. Used as-is, never reconfigured.
    pub http_client: Option<reqwest::Client>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: crate::DEFAULT_API_VERSION.to_string(),
            batch_size_max: COLLECTIONS_BATCH_CEILING,
            bulk_batch_size_max: BULK_BATCH_CEILING,
            bulk_max_bytes: BULK_BYTES_CEILING,
            compression_headers: false,
            max_concurrency: 1,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: crate::USER_AGENT.to_string(),
            enable_tracing: true,
            poll_interval: Duration::from_secs(5),
            poll_timeout: None,
            http_client: None,
        }
    }
}

impl ClientConfig {
    /// Create a new client config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// API version without the leading `v`.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Maximum records per collections request.
    pub fn batch_size_max(&self) -> usize {
        self.batch_size_max
    }

    /// Maximum rows per bulk job.
    pub fn bulk_batch_size_max(&self) -> usize {
        self.bulk_batch_size_max
    }

    /// Whether compression headers are sent.
    pub fn compression_headers(&self) -> bool {
        self.compression_headers
    }

    /// The OAuth flow used to obtain credentials.
    pub fn auth_flow(&self) -> &'static str {
        "client_credentials"
    }

    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<()> {
        let version = self.api_version.as_str();
        let mut parts = version.split('.');
        let valid_version = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(major), Some(minor), None)
                if !major.is_empty()
                    && !minor.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit())
        );
        if !valid_version {
            return Err(Error::config(format!(
                "api version must look like \"64.0\", got {version:?}"
            )));
        }

        check_range("batch_size_max", self.batch_size_max, COLLECTIONS_BATCH_CEILING)?;
        check_range("bulk_batch_size_max", self.bulk_batch_size_max, BULK_BATCH_CEILING)?;
        check_range("bulk_max_bytes", self.bulk_max_bytes, BULK_BYTES_CEILING)?;
        check_range("max_concurrency", self.max_concurrency, MAX_CONCURRENCY)?;

        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval must be greater than zero"));
        }

        Ok(())
    }
}

fn check_range(name: &str, value: usize, ceiling: usize) -> Result<()> {
    if value == 0 || value > ceiling {
        return Err(Error::config(format!(
            "{name} must be between 1 and {ceiling}, got {value}"
        )));
    }
    Ok(())
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the API version. A leading `v` is accepted (`"v64.0"`).
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.config.api_version = version.trim_start_matches('v').to_string();
        self
    }

    /// Set the maximum records per collections request (1..=200).
    pub fn with_batch_size_max(mut self, size: usize) -> Self {
        self.config.batch_size_max = size;
        self
    }

    /// Set the maximum rows per bulk job (1..=10 000).
    pub fn with_bulk_batch_size_max(mut self, size: usize) -> Self {
        self.config.bulk_batch_size_max = size;
        self
    }

    /// Set the maximum CSV bytes per bulk job.
    pub fn with_bulk_max_bytes(mut self, bytes: usize) -> Self {
        self.config.bulk_max_bytes = bytes;
        self
    }

    /// Advertise compressed responses on every request.
    pub fn with_compression_headers(mut self, enabled: bool) -> Self {
        self.config.compression_headers = enabled;
        self
    }

    /// Set how many chunks a single call may dispatch concurrently.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Disable retries.
    pub fn without_retry(mut self) -> Self {
        self.config.retry = RetryConfig::no_retry();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set pool idle timeout.
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    pub fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set custom User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable request/response tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.config.enable_tracing = enabled;
        self
    }

    /// Set the bulk job polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set a deadline for waiting on bulk jobs.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = Some(timeout);
        self
    }

    /// Use a pre-built transport (custom TLS, proxies, pool sizing).
    ///
    /// Timeouts and pool settings on this builder are ignored when a
    /// transport is supplied; the client is used exactly as given.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.config.http_client = Some(client);
        self
    }

    /// Validate and build the client configuration.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
