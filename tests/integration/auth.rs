use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use forcelink::{Creds, RequestMethod, RequestOptions, Salesforce};
use serde_json::json;
use wiremock::matchers::{any, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common::{init_tracing, test_config, API};

fn creds_for(server: &MockServer) -> Creds {
    Creds::new(server.uri(), "consumer-key", "consumer-secret")
}

async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    let issued = Arc::new(AtomicUsize::new(0));
    let instance_url = server.uri();
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_secret=consumer-secret"))
        .respond_with(move |_: &Request| {
            let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": format!("token-{n}"),
                "instance_url": instance_url,
                "token_type": "Bearer"
            }))
        })
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_new_session_does_no_io() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let sf = Salesforce::new(creds_for(&server), test_config().build().unwrap()).unwrap();
    assert_eq!(sf.config().auth_flow(), "client_credentials");
    assert_eq!(sf.config().api_version(), "64.0");
}

#[tokio::test]
async fn test_token_is_acquired_once_and_reused() {
    init_tracing();
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/limits")))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"DailyApiRequests": {}})))
        .expect(2)
        .mount(&server)
        .await;

    let sf = Salesforce::new(creds_for(&server), test_config().build().unwrap()).unwrap();
    assert_eq!(sf.access_token().await.unwrap(), "token-1");
    assert_eq!(sf.instance_url().await.unwrap(), server.uri());

    for _ in 0..2 {
        let response = sf
            .do_request(RequestMethod::Get, "limits", None, &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_request_retried() {
    init_tracing();
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/limits")))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!([
            {"errorCode": "INVALID_SESSION_ID", "message": "Session expired or invalid"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/limits")))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sf = Salesforce::new(creds_for(&server), test_config().build().unwrap()).unwrap();
    let response = sf
        .do_request(RequestMethod::Get, "limits", None, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(sf.access_token().await.unwrap(), "token-2");
}

#[tokio::test]
async fn test_oauth_rejection_is_an_auth_error() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "invalid client credentials"
        })))
        .mount(&server)
        .await;

    let sf = Salesforce::new(creds_for(&server), test_config().build().unwrap()).unwrap();
    let err = sf
        .do_request(RequestMethod::Get, "limits", None, &RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_auth_error(), "unexpected error: {err}");
    assert!(!err.to_string().contains("consumer-secret"));
}

#[test]
fn test_incomplete_credentials_fail_at_construction() {
    let err = Salesforce::new(
        Creds::new("acme.my.salesforce.com", "consumer-key", ""),
        test_config().build().unwrap(),
    )
    .unwrap_err();
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_request_scoped_headers_and_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/sobjects/Account/describe")))
        .and(header("If-Modified-Since", "Wed, 01 Oct 2025 00:00:00 GMT"))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let sf = crate::common::session_for(&server);
    let options = RequestOptions::new().with_header("If-Modified-Since", "Wed, 01 Oct 2025 00:00:00 GMT");
    let response = sf
        .do_request(RequestMethod::Get, "sobjects/Account/describe", None, &options)
        .await
        .unwrap();
    assert!(response.is_not_modified());
}

#[tokio::test]
async fn test_services_paths_hang_off_instance_root() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/apexrest/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let sf = crate::common::session_for(&server);
    let response = sf
        .do_request(
            RequestMethod::Post,
            "/services/apexrest/orders",
            Some(json!({"orderId": "A-1"})),
            &RequestOptions::new(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["accepted"], true);
}
