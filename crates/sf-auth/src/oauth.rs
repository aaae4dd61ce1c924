//! OAuth 2.0 client-credentials flow.
//!
//! Exchanges a connected app's consumer key and secret for an access token
//! and instance URL at `{domain}/services/oauth2/token`. The flow plugs into
//! the dispatcher as a [`TokenSource`], so the credential is fetched lazily
//! and re-fetched whenever Salesforce rejects it.

use async_trait::async_trait;
use forcelink_client::{Credential, TokenSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::credentials::Creds;
use crate::error::{Error, ErrorKind, Result};

/// Client-credentials token exchange for one connected app.
#[derive(Clone)]
pub struct ClientCredentialsFlow {
    creds: Creds,
    token_url: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for ClientCredentialsFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsFlow")
            .field("creds", &self.creds)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsFlow {
    /// Create a flow. The credentials are validated here; no request is made.
    pub fn new(creds: Creds) -> Result<Self> {
        creds.validate()?;
        let token_url = creds.token_url()?;
        Ok(Self {
            creds,
            token_url,
            http_client: reqwest::Client::new(),
        })
    }

    /// Use a caller-configured transport for the token exchange.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn creds(&self) -> &Creds {
        &self.creds
    }

    /// Perform the token exchange.
    ///
    /// The consumer secret is sent in the form body, never in the URL.
    #[instrument(skip(self), fields(domain = %self.creds.domain()))]
    pub async fn authenticate(&self) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.creds.consumer_key()),
            ("client_secret", self.creds.consumer_secret()),
        ];
        let body = serde_urlencoded::to_string(params)?;

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?;

        handle_token_response(response).await
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsFlow {
    async fn acquire(&self) -> forcelink_client::Result<Credential> {
        let token = self.authenticate().await?;
        debug!(instance_url = %token.instance_url, "Client credentials exchange succeeded");
        Ok(token.to_credential())
    }
}

async fn handle_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(error) => Error::new(ErrorKind::OAuth {
                error: error.error,
                description: error.error_description,
            }),
            Err(_) => Error::new(ErrorKind::OAuth {
                error: format!("http_{}", status.as_u16()),
                description: forcelink_client::sanitize_error_message(&body),
            }),
        });
    }

    let token: TokenResponse = response.json().await?;
    if token.access_token.is_empty() || token.instance_url.is_empty() {
        return Err(Error::new(ErrorKind::OAuth {
            error: "invalid_response".to_string(),
            description: "token response is missing access_token or instance_url".to_string(),
        }));
    }
    Ok(token)
}

/// Token endpoint response.
///
/// Token and signature are redacted in Debug output.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    /// Identity URL of the integration user.
    #[serde(default)]
    pub id: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    pub issued_at: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("id", &self.id)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("signature", &self.signature.as_ref().map(|_| "[REDACTED]"))
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl TokenResponse {
    /// Session credential for the dispatcher.
    ///
    /// Client-credentials responses carry no lifetime, so the credential has
    /// no expiry and is replaced only when a request is rejected.
    pub fn to_credential(&self) -> Credential {
        Credential::new(&self.access_token, &self.instance_url)
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}
