use std::sync::OnceLock;
use std::time::Duration;

use forcelink::client::codec::required_str;
use forcelink::{
    Condition, FieldKind, FieldSpec, LikeMatch, QuerySpec, Record, Row, RowSchema, SoqlQuery,
};
use serde_json::{json, Value};
use wiremock::matchers::{any, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common::{accounts, session_for, session_with, test_config, API};

/// Name of the first record in a collections request body.
fn first_name(body: &Value) -> String {
    body["records"][0]["Name"].as_str().unwrap_or_default().to_string()
}

/// Echo one successful result per record, with an id derived from its name.
fn echo_ids(req: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&req.body).unwrap();
    let results: Vec<Value> = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| json!({"id": format!("id:{}", record["Name"].as_str().unwrap()), "success": true, "errors": []}))
        .collect();
    ResponseTemplate::new(200).set_body_json(results)
}

#[tokio::test]
async fn test_insert_collection_chunks_and_keeps_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/composite/sobjects")))
        .and(body_partial_json(json!({"allOrNone": false})))
        .respond_with(echo_ids)
        .expect(3)
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let outcome = sf
        .insert_collection("Account", &accounts(450), 200)
        .await
        .unwrap();

    assert!(outcome.all_succeeded());
    assert_eq!(outcome.results.len(), 450);
    for (i, result) in outcome.results.iter().enumerate() {
        assert_eq!(result.original_index, i);
        assert_eq!(result.id.as_deref(), Some(format!("id:Account {i}").as_str()));
    }
}

#[tokio::test]
async fn test_concurrent_chunks_completing_out_of_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/composite/sobjects")))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            let delay = match first_name(&body).as_str() {
                "Account 0" => 150,
                "Account 200" => 75,
                _ => 0,
            };
            echo_ids(req).set_delay(Duration::from_millis(delay))
        })
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config().with_max_concurrency(3).build().unwrap();
    let sf = session_with(&server, config);
    let outcome = sf
        .insert_collection("Account", &accounts(450), 200)
        .await
        .unwrap();

    let ids: Vec<_> = outcome.results.iter().map(|r| r.id.clone().unwrap()).collect();
    assert_eq!(ids[0], "id:Account 0");
    assert_eq!(ids[200], "id:Account 200");
    assert_eq!(ids[449], "id:Account 449");
}

#[tokio::test]
async fn test_failed_chunk_does_not_abort_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/composite/sobjects")))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            if first_name(&body) == "Account 200" {
                ResponseTemplate::new(500).set_body_json(json!([
                    {"errorCode": "SERVER_UNAVAILABLE", "message": "try again later"}
                ]))
            } else {
                echo_ids(req)
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let outcome = sf
        .insert_collection("Account", &accounts(450), 200)
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 450);
    assert_eq!(outcome.chunk_errors.len(), 1);
    assert_eq!(outcome.chunk_errors[0].index, 1);
    assert_eq!(outcome.chunk_errors[0].range, 200..400);

    assert!(outcome.results[199].success);
    assert!(!outcome.results[200].success);
    assert_eq!(outcome.results[399].errors[0].code, "SERVER_UNAVAILABLE");
    assert!(outcome.results[400].success);

    assert!(outcome.into_results().is_err());
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let sf = session_for(&server);

    let err = sf
        .update_collection("Account", &accounts(3), 200)
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {err}");

    let err = sf
        .insert_collection("Account", &accounts(3), 0)
        .await
        .unwrap_err();
    assert!(err.is_config(), "unexpected error: {err}");

    let err = sf
        .upsert_one("Account", "External_Id__c", &Record::new().with("Name", "Acme"))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {err}");

    let err = sf
        .insert_one("Account; DROP", &Record::new().with("Name", "Acme"))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_single_record_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/sobjects/Account")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "001000000000001AAA", "success": true, "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{API}/sobjects/Account/001000000000001AAA")))
        .and(body_partial_json(json!({"Name": "Acme Corp"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{API}/sobjects/Account/001000000000001AAA")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let created = sf
        .insert_one("Account", &Record::new().with("Name", "Acme"))
        .await
        .unwrap();
    assert!(created.success);
    let id = created.id.unwrap();

    let renamed = Record::new().with("Id", id.as_str()).with("Name", "Acme Corp");
    assert!(sf.update_one("Account", &renamed).await.unwrap().success);
    assert!(sf.delete_one("Account", &renamed).await.unwrap().success);
}

#[tokio::test]
async fn test_composite_upsert_without_all_or_none_groups_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/composite")))
        .and(body_partial_json(json!({"allOrNone": false})))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            let subresponses: Vec<Value> = body["compositeRequest"]
                .as_array()
                .unwrap()
                .iter()
                .map(|sub| {
                    let results: Vec<Value> = sub["body"]["records"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|r| json!({
                            "id": format!("id:{}", r["Ext__c"].as_str().unwrap()),
                            "success": true,
                            "created": true,
                            "errors": []
                        }))
                        .collect();
                    json!({
                        "body": results,
                        "httpHeaders": {},
                        "httpStatusCode": 200,
                        "referenceId": sub["referenceId"]
                    })
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({"compositeResponse": subresponses}))
        })
        .expect(1)
        .mount(&server)
        .await;

    let records: Vec<Record> = (0..5)
        .map(|i| Record::new().with("Ext__c", format!("E{i}")).with("Name", format!("Account {i}")))
        .collect();

    let sf = session_for(&server);
    let outcome = sf
        .upsert_composite("Account", "Ext__c", &records, 2, false)
        .await
        .unwrap();

    let ids: Vec<_> = outcome.results.iter().map(|r| r.id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["id:E0", "id:E1", "id:E2", "id:E3", "id:E4"]);
    assert!(outcome.results.iter().all(|r| r.created == Some(true)));
}

struct Opportunity {
    id: String,
    name: String,
    amount: Option<f64>,
}

impl Row for Opportunity {
    fn schema() -> &'static RowSchema {
        static SCHEMA: OnceLock<RowSchema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            RowSchema::new(vec![
                FieldSpec::new("Id", FieldKind::Text),
                FieldSpec::new("Name", FieldKind::Text),
                FieldSpec::new("Amount", FieldKind::Float),
            ])
        })
    }

    fn from_record(record: Record) -> forcelink::client::Result<Self> {
        Ok(Self {
            id: required_str(&record, "Id")?.to_string(),
            name: required_str(&record, "Name")?.to_string(),
            amount: record.get_f64("Amount"),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("Id", self.id.as_str())
            .with("Name", self.name.as_str())
            .with("Amount", self.amount)
    }
}

struct OpenOpportunities {
    name_prefix: Option<String>,
    stage: Option<String>,
}

impl SoqlQuery for OpenOpportunities {
    fn describe(&self) -> QuerySpec {
        QuerySpec::new("Opportunity")
            .columns(["Id", "Name", "Amount"])
            .condition(Condition::like("Name", self.name_prefix.clone()).matching(LikeMatch::StartsWith))
            .condition(Condition::equals("StageName", self.stage.clone()))
            .condition(Condition::equals("IsClosed", false))
            .order_by("Amount", false)
            .limit(10)
    }
}

#[tokio::test]
async fn test_query_struct_decodes_typed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/query")))
        .and(query_param(
            "q",
            "SELECT Id, Name, Amount FROM Opportunity WHERE Name LIKE '50\\% off%' \
             AND IsClosed = false ORDER BY Amount DESC LIMIT 10",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 2,
            "done": true,
            "records": [
                {"attributes": {"type": "Opportunity"}, "Id": "006A", "Name": "50% off renewals", "Amount": 1200.5},
                {"attributes": {"type": "Opportunity"}, "Id": "006B", "Name": "50% off upsell", "Amount": null}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let query = OpenOpportunities {
        name_prefix: Some("50% off".to_string()),
        stage: None,
    };
    let rows: Vec<Opportunity> = sf.query_struct(&query).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, "006A");
    assert_eq!(rows[0].amount, Some(1200.5));
    assert_eq!(rows[1].name, "50% off upsell");
    assert_eq!(rows[1].amount, None);
}

#[tokio::test]
async fn test_query_iter_pages_through_session() {
    let server = MockServer::start().await;
    let next = format!("{API}/query/01gNEXT-2000");
    Mock::given(method("GET"))
        .and(path(format!("{API}/query")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 3,
            "done": false,
            "nextRecordsUrl": next,
            "records": [{"Id": "001A"}, {"Id": "001B"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(next.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 3,
            "done": true,
            "records": [{"Id": "001C"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sf = session_for(&server);
    let mut pages = sf.query_iter("SELECT Id FROM Account");
    let mut ids = Vec::new();
    while pages.next().await {
        let rows: Vec<Record> = pages.decode().unwrap();
        ids.extend(rows.iter().filter_map(|r| r.id().map(str::to_string)));
    }

    assert!(pages.error().is_none());
    assert_eq!(pages.pages_fetched(), 2);
    assert_eq!(ids, vec!["001A", "001B", "001C"]);
}
