//! InfluxClient against an in-process axum stub of the v2 API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::{TimeZone, Utc};
use vigil_core::error::CoreError;
use vigil_core::status_source::LastSeenQuery;
use vigil_influx::{InfluxClient, InfluxConfig, InfluxError};

// ---------------------------------------------------------------------------
// Stub server
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[derive(Debug, Clone)]
struct RecordedRequest {
    params: HashMap<String, String>,
    authorization: Option<String>,
    body: String,
}

impl Recorded {
    fn push(&self, params: HashMap<String, String>, headers: &HeaderMap, body: String) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            params,
            authorization,
            body,
        });
    }

    fn all(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

const CSV: &str = ",result,table,_time,device_id\r\n\
                   ,_result,0,2026-10-16T12:00:00Z,d1\r\n\
                   \r\n";

async fn query_ok(
    State(recorded): State<Recorded>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    recorded.push(params, &headers, body);
    (StatusCode::OK, CSV.to_string())
}

async fn write_ok(
    State(recorded): State<Recorded>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    recorded.push(params, &headers, body);
    StatusCode::NO_CONTENT
}

async fn unauthorized() -> (StatusCode, &'static str) {
    (StatusCode::UNAUTHORIZED, r#"{"code":"unauthorized"}"#)
}

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn healthy_stub() -> (InfluxClient, Recorded) {
    let recorded = Recorded::default();
    let router = Router::new()
        .route("/api/v2/query", post(query_ok))
        .route("/api/v2/write", post(write_ok))
        .route("/health", get(|| async { r#"{"status":"pass"}"# }))
        .with_state(recorded.clone());
    let url = spawn_stub(router).await;
    let client = InfluxClient::new(InfluxConfig::new(&url, "secret", "acme", "telemetry")).unwrap();
    (client, recorded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn latest_seen_issues_one_batched_query() {
    let (client, recorded) = healthy_stub().await;
    let ids = vec!["d1".to_string(), "d2".to_string(), "d3".to_string()];

    let latest = client.latest_seen(&ids).await.unwrap();

    assert_eq!(latest.len(), 1);
    assert_eq!(
        latest["d1"],
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    );

    let requests = recorded.all();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.params.get("org").map(String::as_str), Some("acme"));
    assert_eq!(request.authorization.as_deref(), Some("Token secret"));

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["type"], "flux");
    assert_eq!(body["dialect"]["header"], true);
    let flux = body["query"].as_str().unwrap();
    assert!(flux.contains(r#"set: ["d1", "d2", "d3"]"#));
    assert!(flux.contains("from(bucket: \"telemetry\")"));
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let (client, recorded) = healthy_stub().await;

    let latest = client.query_last_seen(&[]).await.unwrap();

    assert!(latest.is_empty());
    assert!(recorded.all().is_empty());
}

#[tokio::test]
async fn write_heartbeat_sends_line_protocol() {
    let (client, recorded) = healthy_stub().await;
    let seen = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

    client.write_heartbeat("ward 3", seen).await.unwrap();

    let requests = recorded.all();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.params.get("bucket").map(String::as_str), Some("telemetry"));
    assert_eq!(request.params.get("precision").map(String::as_str), Some("ns"));
    assert_eq!(
        request.body,
        format!(
            r"heartbeat,device_id=ward\ 3 alive=1i {}",
            seen.timestamp_nanos_opt().unwrap()
        )
    );
}

#[tokio::test]
async fn health_passes_against_healthy_stub() {
    let (client, _) = healthy_stub().await;
    assert!(client.health().await.is_ok());
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let router = Router::new()
        .route("/api/v2/query", post(unauthorized))
        .route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let url = spawn_stub(router).await;
    let client = InfluxClient::new(InfluxConfig::new(&url, "bad", "acme", "telemetry")).unwrap();

    let result = client.query_last_seen(&["d1".to_string()]).await;
    assert_matches!(result, Err(InfluxError::Api { status: 401, .. }));

    assert_matches!(client.health().await, Err(InfluxError::Api { status: 503, .. }));
}

#[tokio::test]
async fn failure_surfaces_as_upstream_unavailable() {
    let router = Router::new().route("/api/v2/query", post(unauthorized));
    let url = spawn_stub(router).await;
    let client = InfluxClient::new(InfluxConfig::new(&url, "bad", "acme", "telemetry")).unwrap();

    let result = client.latest_seen(&["d1".to_string()]).await;

    assert_matches!(result, Err(CoreError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn unreachable_server_is_request_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        InfluxClient::new(InfluxConfig::new(&format!("http://{addr}"), "t", "o", "b")).unwrap();

    assert_matches!(client.health().await, Err(InfluxError::Request(_)));
}
