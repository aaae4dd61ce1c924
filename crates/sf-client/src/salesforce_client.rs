//! Authenticated request dispatch.
//!
//! `SalesforceClient` pairs the raw [`SfHttpClient`] with the session's
//! [`AuthManager`]. Every request gets the current bearer token and instance
//! URL. A 401 triggers one credential refresh and one replay of the same
//! request; a second 401 is fatal.
//!
//! ## Security
//!
//! - Access tokens are redacted in Debug output
//! - Request bodies and tokens are skipped in tracing spans

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::auth::{AuthManager, Credential};
use crate::client::SfHttpClient;
use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{RequestBuilder, RequestMethod, RequestOptions};
use crate::response::Response;

/// Authenticated Salesforce API dispatcher shared by every API surface.
///
/// Cloning is cheap; clones share the transport pool and the credential.
#[derive(Clone)]
pub struct SalesforceClient {
    http: SfHttpClient,
    auth: Arc<AuthManager>,
}

impl std::fmt::Debug for SalesforceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceClient")
            .field("api_version", &self.http.config().api_version)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl SalesforceClient {
    /// Create a dispatcher. No network I/O happens until the first request.
    pub fn new(config: ClientConfig, auth: Arc<AuthManager>) -> Result<Self> {
        config.validate()?;
        let http = SfHttpClient::new(config)?;
        Ok(Self { http, auth })
    }

    pub fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    /// API version without the leading `v`.
    pub fn api_version(&self) -> &str {
        &self.http.config().api_version
    }

    /// The credential owner shared by every clone of this client.
    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Current access token, acquiring one if needed.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.auth.credential().await?.access_token().to_string())
    }

    /// Current instance URL, acquiring a credential if needed.
    pub async fn instance_url(&self) -> Result<String> {
        Ok(self.auth.credential().await?.instance_url().to_string())
    }

    /// Resolve a request path against an instance URL.
    ///
    /// - absolute `http(s)://` URLs are used unchanged
    /// - paths under `/services/` hang off the instance root
    /// - anything else is relative to `/services/data/v{version}/`
    pub fn resolve_url(&self, instance_url: &str, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with("/services/") {
            format!("{instance_url}{path}")
        } else {
            format!(
                "{}/services/data/v{}/{}",
                instance_url,
                self.api_version(),
                path.trim_start_matches('/')
            )
        }
    }

    /// Start a GET for `path`; see [`resolve_url`](Self::resolve_url).
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.http.patch(path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.http.put(path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(path)
    }

    /// Send a request built from one of the path builders above.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.url))]
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let credential = self.auth.credential().await?;

        match self.send_with(&credential, &request).await {
            Err(err) if err.status() == Some(401) => {
                warn!("Received 401, refreshing credential and retrying once");
                let refreshed = self.auth.refresh(&credential).await?;
                match self.send_with(&refreshed, &request).await {
                    Err(err) if err.status() == Some(401) => Err(Error::with_source(
                        ErrorKind::Authentication("credential rejected".to_string()),
                        err,
                    )),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn send_with(&self, credential: &Credential, request: &RequestBuilder) -> Result<Response> {
        let mut attempt = request.clone();
        attempt.url = self.resolve_url(credential.instance_url(), &request.url);
        self.http
            .execute(attempt.bearer_auth(credential.access_token()))
            .await
    }

    /// Send a request and deserialize the JSON response.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.execute(request).await?.json().await
    }

    /// Issue an arbitrary request with per-call options.
    ///
    /// A 304 response is returned as-is rather than as an error.
    pub async fn do_request(
        &self,
        method: RequestMethod,
        path: &str,
        body: Option<serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<Response> {
        let mut request = RequestBuilder::new(method, path);
        if let Some(body) = body {
            request = request.json_value(body);
        }
        self.execute(request.options(options)).await
    }

    /// GET with JSON response deserialization.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute_json(self.get(path)).await
    }

    /// POST a JSON body and deserialize the JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute_json(self.post(path).json(body)?).await
    }

    /// PATCH a JSON body and deserialize the JSON response.
    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute_json(self.patch(path).json(body)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticToken, TokenSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct SequencedTokens {
        instance_url: String,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenSource for SequencedTokens {
        async fn acquire(&self) -> Result<Credential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential::new(format!("token-{n}"), &self.instance_url))
        }
    }

    fn client_for(server: &MockServer) -> (SalesforceClient, Arc<SequencedTokens>) {
        let tokens = Arc::new(SequencedTokens {
            instance_url: server.uri(),
            calls: AtomicU32::new(0),
        });
        let auth = Arc::new(AuthManager::new(tokens.clone()));
        let config = ClientConfig::builder().without_retry().build().unwrap();
        (SalesforceClient::new(config, auth).unwrap(), tokens)
    }

    #[test]
    fn test_url_resolution() {
        let auth = Arc::new(AuthManager::new(Arc::new(StaticToken::new("t", "https://x"))));
        let client = SalesforceClient::new(ClientConfig::default(), auth).unwrap();
        let base = "https://na1.salesforce.com";

        assert_eq!(
            client.resolve_url(base, "sobjects/Account"),
            "https://na1.salesforce.com/services/data/v64.0/sobjects/Account"
        );
        assert_eq!(
            client.resolve_url(base, "/services/data/v64.0/query/01gxx-2000"),
            "https://na1.salesforce.com/services/data/v64.0/query/01gxx-2000"
        );
        assert_eq!(
            client.resolve_url(base, "https://other.example.com/path"),
            "https://other.example.com/path"
        );
    }

    #[test]
    fn test_debug_redacts() {
        let auth = Arc::new(AuthManager::new(Arc::new(StaticToken::new("secret-token", "https://x"))));
        let client = SalesforceClient::new(ClientConfig::default(), auth).unwrap();
        assert!(!format!("{client:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn test_bearer_and_instance_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v64.0/limits"))
            .and(header("Authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let body: serde_json::Value = client.get_json("limits").await.unwrap();
        assert_eq!(body["ok"], 1);
    }

    #[tokio::test]
    async fn test_401_then_200_refreshes_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v64.0/limits"))
            .and(header("Authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!([{
                "errorCode": "INVALID_SESSION_ID",
                "message": "Session expired or invalid"
            }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v64.0/limits"))
            .and(header("Authorization", "Bearer token-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let (client, tokens) = client_for(&server);
        let _: serde_json::Value = client.get_json("limits").await.unwrap();

        assert_eq!(tokens.calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.auth().acquisitions(), 2);
    }

    #[tokio::test]
    async fn test_two_401s_are_fatal_without_third_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/data/v64.0/sobjects/Account"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let err = client
            .post_json::<serde_json::Value, _>("sobjects/Account", &serde_json::json!({"Name": "Acme"}))
            .await
            .unwrap_err();

        assert!(err.is_auth_error());
        assert!(err.to_string().contains("credential rejected"));
    }

    #[tokio::test]
    async fn test_do_request_extra_headers_and_304() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v64.0/sobjects/Account/describe"))
            .and(header("If-None-Match", "\"describe-v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let options = RequestOptions::new().with_header("If-None-Match", "\"describe-v1\"");
        let response = client
            .do_request(RequestMethod::Get, "sobjects/Account/describe", None, &options)
            .await
            .unwrap();

        assert!(response.is_not_modified());
    }

    #[tokio::test]
    async fn test_request_options_do_not_leak() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v64.0/limits"))
            .and(header("X-Scoped", "yes"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v64.0/limits"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let scoped = client
            .do_request(
                RequestMethod::Get,
                "limits",
                None,
                &RequestOptions::new().with_header("X-Scoped", "yes"),
            )
            .await
            .unwrap();
        assert_eq!(scoped.status(), 200);

        let plain = client
            .do_request(RequestMethod::Get, "limits", None, &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(plain.status(), 204);
    }
}
