use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use forcelink::{BulkOptions, ErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, body_string, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common::{accounts, session_for, session_with, test_config, API};

fn job(id: &str, state: &str) -> serde_json::Value {
    json!({"id": id, "state": state, "object": "Account", "operation": "upsert"})
}

/// Job status reads: `InProgress` for the first `running` polls, then `final_state`.
async fn mount_job_status(server: &MockServer, id: &'static str, running: usize, final_state: &'static str) {
    let polls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path(format!("{API}/jobs/ingest/{id}")))
        .respond_with(move |_: &Request| {
            let state = if polls.fetch_add(1, Ordering::SeqCst) < running {
                "InProgress"
            } else {
                final_state
            };
            ResponseTemplate::new(200).set_body_json(job(id, state))
        })
        .mount(server)
        .await;
}

async fn mount_results(server: &MockServer, id: &str) {
    let results = [
        ("successfulResults", "sf__Id,sf__Created,Ext__c,Name\n001A,true,E1,Acme\n"),
        (
            "failedResults",
            "sf__Id,sf__Error,Ext__c,Name\n,DUPLICATE_VALUE:duplicate value found,E2,Globex\n",
        ),
        ("unprocessedrecords", "Ext__c,Name\n"),
    ];
    for (endpoint, body) in results {
        Mock::given(method("GET"))
            .and(path(format!("{API}/jobs/ingest/{id}/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_csv_upsert_lifecycle_and_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/jobs/ingest")))
        .and(body_partial_json(json!({
            "object": "Account",
            "operation": "upsert",
            "externalIdFieldName": "Ext__c",
            "contentType": "CSV",
            "lineEnding": "LF"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("750U", "Open")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{API}/jobs/ingest/750U/batches")))
        .and(body_string("Ext__c,Name\nE1,Acme\nE2,Globex\n"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{API}/jobs/ingest/750U")))
        .and(body_json(json!({"state": "UploadComplete"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("750U", "UploadComplete")))
        .expect(1)
        .mount(&server)
        .await;
    mount_job_status(&server, "750U", 2, "JobComplete").await;
    mount_results(&server, "750U").await;

    let sf = session_for(&server);
    let options = BulkOptions::new()
        .with_external_id_field("Ext__c")
        .wait_for_results(true);
    let csv: &[u8] = b"Ext__c,Name\nE1,Acme\nE2,Globex\n";
    let jobs = sf.upsert_bulk_csv("Account", csv, &options).await.unwrap();
    assert_eq!(jobs, vec!["750U"]);

    let results = sf.get_job_results("750U").await.unwrap();
    assert_eq!(results.job.state, forcelink::JobState::JobComplete);
    assert_eq!(results.successful.len(), 1);
    assert_eq!(results.successful[0].id, "001A");
    assert!(results.successful[0].created);
    assert_eq!(results.successful[0].record.get_str("Ext__c"), Some("E1"));
    assert_eq!(results.failed.len(), 1);
    assert!(results.failed[0].error.starts_with("DUPLICATE_VALUE"));
    assert!(results.unprocessed.is_empty());
}

#[tokio::test]
async fn test_results_of_running_job_are_a_state_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/jobs/ingest/750R")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("750R", "InProgress")))
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let err = sf.get_job_results("750R").await.unwrap_err();
    assert!(err.is_state(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_poll_deadline_surfaces_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/jobs/ingest")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("750T", "Open")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{API}/jobs/ingest/750T/batches")))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{API}/jobs/ingest/750T")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("750T", "UploadComplete")))
        .expect(1)
        .mount(&server)
        .await;
    mount_job_status(&server, "750T", usize::MAX, "JobComplete").await;

    let config = test_config()
        .with_poll_timeout(Duration::from_millis(80))
        .build()
        .unwrap();
    let sf = session_with(&server, config);
    let err = sf
        .insert_bulk("Account", &accounts(2), &BulkOptions::new().wait_for_results(true))
        .await
        .unwrap_err();

    assert_eq!(err.submitted_jobs(), ["750T".to_string()]);
    match err.kind {
        ErrorKind::Bulk(forcelink::bulk::ErrorKind::Submission { chunk, ref job_id, ref cause, .. }) => {
            assert_eq!(chunk, 0);
            assert_eq!(job_id.as_deref(), Some("750T"));
            assert!(matches!(
                **cause,
                forcelink::bulk::ErrorKind::Timeout { ref job_id, .. } if job_id == "750T"
            ));
        }
        ref other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_bulk_query_export_through_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/jobs/query")))
        .and(body_partial_json(json!({"operation": "query", "query": "SELECT Id, Name FROM Account"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "750Q", "state": "UploadComplete", "operation": "query"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/jobs/query/750Q")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "750Q", "state": "JobComplete", "operation": "query"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/jobs/query/750Q/results")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Sforce-Locator", "null")
                .insert_header("Sforce-NumberOfRecords", "2")
                .set_body_string("\"Id\",\"Name\"\n\"001A\",\"Acme\"\n\"001B\",\"Globex\"\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let mut out = Vec::new();
    let rows = sf
        .query_bulk_export("SELECT Id, Name FROM Account", &mut out)
        .await
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\"Id\",\"Name\"\n\"001A\",\"Acme\"\n\"001B\",\"Globex\"\n"
    );
}
