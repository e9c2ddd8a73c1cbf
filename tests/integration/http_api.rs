//! HTTP clients against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use custsync::api::{HttpJobControl, JobControlApi};
use custsync::clock::SystemClock;
use custsync::config::{ApiConfig, SyncSettings};
use custsync::controller::{StartOutcome, SyncController};
use custsync::customers::{CustomerApi, CustomerUpdate, HttpCustomerApi, NewCustomer};
use custsync::error::SyncError;
use custsync::job::JobStatus;
use custsync::stream::{HttpStreamProvider, StreamProvider};
use chrono::TimeZone;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        ..ApiConfig::default()
    }
}

#[tokio::test]
async fn test_start_sync_returns_totals() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers/sync"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "totalRows": 2000000,
            "totalPages": 200000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpJobControl::new(&api_config(&server)).unwrap();
    let started = api.start_sync().await.unwrap();
    assert_eq!(started.total_rows, 2_000_000);
    assert_eq!(started.total_pages, 200_000);
}

#[tokio::test]
async fn test_start_sync_rejection_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers/sync"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "message": "Sync already running" })),
        )
        .mount(&server)
        .await;

    let api = HttpJobControl::new(&api_config(&server)).unwrap();
    match api.start_sync().await {
        Err(SyncError::Rejected { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message.as_deref(), Some("Sync already running"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sync_status_variants() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing",
            "processedRows": 500,
            "totalRows": 2000000,
            "progress": 0.025,
            "startedAt": "2026-03-01T10:00:00.000Z"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/status"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "No sync job" })),
        )
        .mount(&server)
        .await;

    let api = HttpJobControl::new(&api_config(&server)).unwrap();
    let job = api.sync_status().await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.processed_rows, 500);
    assert_eq!(
        job.started_at,
        Some(chrono::Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap())
    );

    assert!(api.sync_status().await.unwrap().is_none());
    assert!(api.sync_status().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sync_status_server_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = HttpJobControl::new(&api_config(&server)).unwrap();
    assert!(matches!(
        api.sync_status().await,
        Err(SyncError::Rejected { status: 500, .. })
    ));
}

fn sse_body() -> String {
    [
        ": connected\n\n",
        "data: {\"processedRows\":50,\"totalRows\":100,\"progress\":50,\"status\":\"processing\"}\n\n",
        "data: not json\n\n",
        "data: {\"processedRows\":100,\"totalRows\":100,\"progress\":100,\"status\":\"completed\"}\r\n\r\n",
    ]
    .concat()
}

#[tokio::test]
async fn test_event_stream_yields_data_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body()),
        )
        .mount(&server)
        .await;

    let config = api_config(&server);
    let jobs = HttpJobControl::new(&config).unwrap();
    let streams = HttpStreamProvider::new(&config).unwrap();
    let payloads: Vec<String> = streams
        .subscribe(&jobs.stream_endpoint())
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(payloads.len(), 3);
    assert!(payloads[0].contains("\"processedRows\":50"));
    assert_eq!(payloads[1], "not json");
    assert!(payloads[2].contains("completed"));
}

#[tokio::test]
async fn test_event_stream_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let streams = HttpStreamProvider::new(&api_config(&server)).unwrap();
    let result = streams
        .subscribe(&format!("{}/customers/sync/stream", server.uri()))
        .await;
    assert!(matches!(result, Err(SyncError::Rejected { status: 503, .. })));
}

#[tokio::test]
async fn test_controller_end_to_end_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers/sync"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "totalRows": 100, "totalPages": 10 })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/sync/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body()),
        )
        .mount(&server)
        .await;

    let config = api_config(&server);
    let controller = SyncController::new(
        Arc::new(HttpJobControl::new(&config).unwrap()),
        Arc::new(HttpStreamProvider::new(&config).unwrap()),
        Arc::new(SystemClock),
        SyncSettings::default(),
    );
    let mut updates = controller.subscribe();
    assert_eq!(controller.start_sync().await.unwrap(), StartOutcome::Started);

    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if !updates.borrow_and_update().is_uploading {
                break;
            }
            updates.changed().await.unwrap();
        }
    })
    .await;
    assert!(finished.is_ok(), "sync did not finish");

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.processed, 100);
    assert_eq!(snapshot.upload_progress, 100.0);
    assert_eq!(snapshot.error, None);
    controller.dispose();
}

#[tokio::test]
async fn test_customer_list_reads_meta() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "a1", "customerId": "C1", "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com" }
            ],
            "meta": { "totalPages": 7 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [], "meta": { "totalPages": 0 } })))
        .mount(&server)
        .await;

    let api = HttpCustomerApi::new(&api_config(&server)).unwrap();
    let page = api.list(2, 10).await.unwrap();
    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages, 7);
    assert_eq!(page.data[0].full_name(), "Ada Lovelace");

    let empty = api.list(1, 10).await.unwrap();
    assert!(empty.data.is_empty());
    assert_eq!(empty.total_pages, 1);
}

#[tokio::test]
async fn test_customer_create_update_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "n1", "customerId": "C9", "firstName": "Grace", "lastName": "Hopper", "email": "grace@example.com"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/customers/n1"))
        .and(body_json(json!({ "company": "Navy" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "n1", "customerId": "C9", "firstName": "Grace", "lastName": "Hopper", "company": "Navy"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/customers/n1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/customers/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": ["Customer not found"] })))
        .mount(&server)
        .await;

    let api = HttpCustomerApi::new(&api_config(&server)).unwrap();
    let created = api
        .create(&NewCustomer {
            customer_id: "C9".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            company: String::new(),
            city: String::new(),
            country: String::new(),
            phone1: String::new(),
            phone2: String::new(),
            email: "grace@example.com".to_string(),
            subscription_date: chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            website: String::new(),
            about: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "n1");

    let updated = api
        .update(
            "n1",
            &CustomerUpdate {
                company: Some("Navy".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.company, "Navy");

    api.delete("n1").await.unwrap();
    let err = api.delete("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.user_message("Failed to delete customer"), "Customer not found");
}
