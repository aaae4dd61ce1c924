//! Connected-app credentials for the client-credentials flow.

use url::Url;

use crate::error::{Error, ErrorKind, Result};

/// Domain, consumer key and consumer secret of a connected app.
///
/// The secret is redacted in Debug output and has no public getter.
#[derive(Clone)]
pub struct Creds {
    domain: String,
    consumer_key: String,
    consumer_secret: String,
}

impl std::fmt::Debug for Creds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creds")
            .field("domain", &self.domain)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

impl Creds {
    /// Create credentials.
    ///
    /// `domain` is either a bare My Domain host (`acme.my.salesforce.com`)
    /// or a full base URL; bare hosts get `https://`.
    pub fn new(
        domain: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Load credentials from environment variables.
    ///
    /// Reads `SF_DOMAIN`, `SF_CONSUMER_KEY` and `SF_CONSUMER_SECRET`, each
    /// falling back to its `SALESFORCE_` prefixed form.
    pub fn from_env() -> Result<Self> {
        let creds = Self::new(
            env_var("SF_DOMAIN", "SALESFORCE_DOMAIN")?,
            env_var("SF_CONSUMER_KEY", "SALESFORCE_CONSUMER_KEY")?,
            env_var("SF_CONSUMER_SECRET", "SALESFORCE_CONSUMER_SECRET")?,
        );
        creds.validate()?;
        Ok(creds)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub(crate) fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }

    /// Check that every part is present and the domain forms a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(invalid("domain is empty"));
        }
        if self.consumer_key.trim().is_empty() {
            return Err(invalid("consumer key is empty"));
        }
        if self.consumer_secret.is_empty() {
            return Err(invalid("consumer secret is empty"));
        }
        self.base_url()?;
        Ok(())
    }

    /// Base URL of the org's login endpoint, without a trailing slash.
    pub fn base_url(&self) -> Result<String> {
        let domain = self.domain.trim().trim_end_matches('/');
        let candidate = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };

        let parsed = Url::parse(&candidate)?;
        if parsed.host_str().is_none() {
            return Err(invalid("domain has no host"));
        }
        Ok(candidate)
    }

    /// Full URL of the OAuth token endpoint.
    pub fn token_url(&self) -> Result<String> {
        Ok(format!("{}/services/oauth2/token", self.base_url()?))
    }
}

fn env_var(primary: &str, fallback: &str) -> Result<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .map_err(|_| Error::new(ErrorKind::EnvVar(primary.to_string())))
}

fn invalid(message: &str) -> Error {
    Error::new(ErrorKind::InvalidCredentials(message.to_string()))
}
