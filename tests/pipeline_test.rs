//! End-to-end: gateway, audit worker and SQLite store wired together.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use vantage_audit::{audit_channel, AuditWorker};
use vantage_core::mocks::MockSafetyClassifier;
use vantage_core::traits::InteractionStore;
use vantage_core::GovernancePolicy;
use vantage_gateway::{GatewayConfig, GatewayServer, Upstream};
use vantage_governance::{GovernanceFilter, MetricsSink};
use vantage_store::SqliteInteractionStore;

const CHAT_REPLY: &str = r#"{"text":"Hello!","meta":{"billed_units":{"input_tokens":10,"output_tokens":5}}}"#;

#[derive(Default)]
struct CohereStub {
    forwarded: Mutex<Vec<Bytes>>,
}

#[async_trait]
impl Upstream for CohereStub {
    async fn forward(&self, request: Request) -> vantage_core::Result<Response> {
        let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        self.forwarded.lock().unwrap().push(body);
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(CHAT_REPLY))
            .unwrap())
    }
}

/// Send `requests` through a fresh pipeline and return the stored records as JSON.
async fn run_pipeline(requests: Vec<Request>) -> (Vec<(StatusCode, Bytes)>, Vec<Value>, Arc<CohereStub>) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn InteractionStore> =
        Arc::new(SqliteInteractionStore::open(dir.path().join("audit.db")).unwrap());
    let upstream = Arc::new(CohereStub::default());
    let metrics = Arc::new(MetricsSink::new().unwrap());

    let (audit, audit_rx) = audit_channel(16);
    let worker = AuditWorker::new(
        audit_rx,
        store.clone(),
        Arc::new(MockSafetyClassifier::constant(0.97)),
        metrics,
    )
    .spawn();

    let policy = GovernancePolicy::new(["secret_key"], true);
    let server = GatewayServer::new(
        GatewayConfig::default(),
        store.clone(),
        Arc::new(GovernanceFilter::new(&policy)),
        audit,
        upstream.clone(),
    );

    let mut responses = Vec::new();
    for request in requests {
        let response = server.build_router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        responses.push((status, body));
    }

    // Dropping the server closes the queue; the worker exits once it is empty.
    drop(server);
    worker.join().await.unwrap();

    let records = store
        .list(0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();

    (responses, records, upstream)
}

fn chat(message: &str) -> Request {
    Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-User-ID", "tenant-a")
        .body(Body::from(json!({ "message": message }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_forbidden_keyword_end_to_end() {
    let (responses, records, upstream) = run_pipeline(vec![chat("my secret_key is abc")]).await;

    assert_eq!(responses[0].0, StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_slice(&responses[0].1).unwrap();
    assert_eq!(body, json!({"error": "Security Policy Violation", "code": "FORBIDDEN_CONTENT"}));
    assert!(upstream.forwarded.lock().unwrap().is_empty());

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["is_blocked"], true);
    assert_eq!(record["is_redacted"], false);
    assert_eq!(record["status_code"], 403);
    assert_eq!(record["tokens"], 0);
    assert_eq!(record["user_id"], "tenant-a");
}

#[tokio::test]
async fn test_pii_redaction_end_to_end() {
    let (responses, records, upstream) = run_pipeline(vec![chat("reach me at a@b.com")]).await;

    assert_eq!(responses[0].0, StatusCode::OK);
    assert_eq!(responses[0].1, Bytes::from_static(CHAT_REPLY.as_bytes()));

    let forwarded = upstream.forwarded.lock().unwrap();
    let forwarded = String::from_utf8(forwarded[0].to_vec()).unwrap();
    assert!(forwarded.contains("[REDACTED_EMAIL]"));

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["is_redacted"], true);
    assert_eq!(record["is_blocked"], false);
    assert_eq!(record["tokens"], 15);
    assert_eq!(record["safety_score"], 0.97);
    let stored_request = record["request_body"].as_str().unwrap();
    assert!(stored_request.contains("[REDACTED_EMAIL]"));
    assert!(!stored_request.contains("a@b.com"));
}

#[tokio::test]
async fn test_records_listed_newest_first() {
    let (_, records, _) = run_pipeline(vec![chat("first"), chat("second"), chat("third")]).await;

    assert_eq!(records.len(), 3);
    let messages: Vec<Value> = records
        .iter()
        .map(|r| serde_json::from_str(r["request_body"].as_str().unwrap()).unwrap())
        .collect();
    assert_eq!(messages[0]["message"], "third");
    assert_eq!(messages[2]["message"], "first");
}
