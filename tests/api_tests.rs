mod common;

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode as AxumStatus};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use fieldrelay::delivery::{HttpTransport, WebhookTransport};

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(resp.text().await.unwrap(), "ok");
}

// ── Intake ──────────────────────────────────────────────────────

#[tokio::test]
async fn submit_waits_for_delivery() {
    let app = common::spawn_app().await;
    let token = app.technician_token();

    let (body, status) = app
        .submit("work_order", &common::work_order(), Some(&token))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["delivered"], true);
    assert_eq!(body["attempts"], 1);

    let id: Uuid = body["submission_id"].as_str().unwrap().parse().unwrap();
    let row = app.store.submission(id).await;
    assert_eq!(row.submitter.as_deref(), Some("30123456"));
    assert!(row.webhook_success);
}

#[tokio::test]
async fn anonymous_submission_has_no_identity() {
    let app = common::spawn_app().await;

    let (body, status) = app.submit("receipt", &common::receipt(), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let id: Uuid = body["submission_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.store.submission(id).await.submitter, None);
}

#[tokio::test]
async fn failed_delivery_still_returns_the_id() {
    let app = common::spawn_app().await;
    app.transport.push_statuses(&[500, 500, 500]);

    let (body, status) = app.submit("work_order", &common::work_order(), None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["delivered"], false);
    assert_eq!(body["attempts"], 3);
    let id = body["submission_id"].as_str().unwrap();
    assert!(body["message"].as_str().unwrap().contains(id));
    assert!(body["message"].as_str().unwrap().contains("safely stored"));
}

#[tokio::test]
async fn submit_without_waiting() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .post(app.url("/api/v1/submissions?wait=false"))
        .json(&json!({ "form_type": "receipt", "payload": common::receipt() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    assert!(body["submission_id"].is_string());
}

#[tokio::test]
async fn missing_fields_are_reported() {
    let app = common::spawn_app().await;

    let (body, status) = app
        .submit("receipt", &json!({ "clientName": "Panadería Sur" }), None)
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["missing_fields"],
        json!(["receptorNombre", "receptorDni", "firma"])
    );
    assert!(app.store.all_submissions().await.is_empty());
}

#[tokio::test]
async fn unknown_form_type_is_a_json_bad_request() {
    let app = common::spawn_app().await;

    let (body, status) = app.submit("invoice", &common::receipt(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown form type: invoice");

    let resp = app
        .client
        .post(app.url("/api/v1/submissions"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(app.store.all_submissions().await.is_empty());
}

#[tokio::test]
async fn backup_failure_is_service_unavailable() {
    let app = common::spawn_app().await;
    app.store.fail_create.store(true, Ordering::SeqCst);

    let (body, status) = app.submit("receipt", &common::receipt(), None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("durability"));
    assert_eq!(app.transport.call_count(), 0);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = common::spawn_app().await;

    let (_, status) = app
        .submit("receipt", &common::receipt(), Some("not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.transport.call_count(), 0);
}

// ── Console ─────────────────────────────────────────────────────

#[tokio::test]
async fn console_requires_operator() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/api/v1/admin/submissions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (_, status) = app
        .get_auth("/api/v1/admin/submissions", &app.technician_token())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (body, status) = app
        .get_auth("/api/v1/admin/submissions", &app.operator_token())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn operator_replays_failed_submission() {
    let app = common::spawn_app().await;
    let token = app.operator_token();
    app.transport.push_statuses(&[500, 500, 500]);

    let (body, _) = app.submit("work_order", &common::work_order(), None).await;
    let id = body["submission_id"].as_str().unwrap().to_string();

    let (failed, status) = app
        .get_auth("/api/v1/admin/submissions?status=failed", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed.as_array().unwrap().len(), 1);
    assert_eq!(failed[0]["id"], id.as_str());
    assert_eq!(failed[0]["retry_count"], 3);

    let (body, status) = app
        .post_auth(&format!("/api/v1/admin/submissions/{id}/replay"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], true);
    assert_eq!(body["attempt_number"], 4);

    let (failed, _) = app
        .get_auth("/api/v1/admin/submissions?status=failed", &token)
        .await;
    assert_eq!(failed, json!([]));

    // Delivered submissions are not re-sent.
    let (_, status) = app
        .post_auth(&format!("/api/v1/admin/submissions/{id}/replay"), &token)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (detail, status) = app
        .get_auth(&format!("/api/v1/admin/submissions/{id}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["attempts"].as_array().unwrap().len(), 4);
    assert_eq!(detail["attempts"][3]["origin"], "replay");
}

#[tokio::test]
async fn replay_unknown_submission_is_not_found() {
    let app = common::spawn_app().await;

    let (_, status) = app
        .post_auth(
            &format!("/api/v1/admin/submissions/{}/replay", Uuid::now_v7()),
            &app.operator_token(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_status_filter_is_bad_request() {
    let app = common::spawn_app().await;

    let (_, status) = app
        .get_auth("/api/v1/admin/submissions?status=weird", &app.operator_token())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn attempts_and_summary() {
    let app = common::spawn_app().await;
    let token = app.operator_token();
    app.transport.push_statuses(&[503, 200]);
    app.submit("receipt", &common::receipt(), None).await;

    let (attempts, status) = app
        .get_auth("/api/v1/admin/attempts?success=false", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(attempts.as_array().unwrap().len(), 1);
    assert_eq!(attempts[0]["http_status"], 503);

    let (summary, status) = app.get_auth("/api/v1/admin/summary", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        summary,
        json!({ "total": 1, "delivered": 1, "failed": 0, "recent_failed_attempts": 1 })
    );
}

#[tokio::test]
async fn export_csv_download() {
    let app = common::spawn_app().await;
    let token = app.operator_token();
    app.submit("receipt", &common::receipt(), None).await;

    let resp = app
        .client
        .get(app.url("/api/v1/admin/export/attempts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "text/csv");
    assert_eq!(
        resp.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"attempt_log.csv\""
    );
    let body = resp.text().await.unwrap();
    assert_eq!(body.lines().count(), 2);
    assert!(body.starts_with("id,submission_id,payload,"));

    let (_, status) = app
        .get_auth("/api/v1/admin/export/users", &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── HTTP transport ──────────────────────────────────────────────

#[derive(Clone, Default)]
struct Receiver {
    status: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn receive(
    State(receiver): State<Receiver>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (AxumStatus, &'static str) {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    receiver.received.lock().unwrap().push((content_type, body));
    let status = AxumStatus::from_u16(receiver.status.load(Ordering::SeqCst))
        .unwrap_or(AxumStatus::OK);
    (status, "received")
}

async fn spawn_receiver(status: u16) -> (String, Receiver) {
    let receiver = Receiver::default();
    receiver.status.store(status, Ordering::SeqCst);

    let app = Router::new()
        .route("/hook", post(receive))
        .with_state(receiver.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/hook"), receiver)
}

#[tokio::test]
async fn http_transport_posts_json() {
    let (url, receiver) = spawn_receiver(200).await;
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

    let resp = transport.post_json(&url, &common::work_order()).await.unwrap();

    assert!(resp.is_success());
    assert_eq!(resp.body, "received");

    let received = receiver.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0.as_deref(), Some("application/json"));
    assert_eq!(received[0].1, common::work_order());
}

#[tokio::test]
async fn http_transport_reports_non_success_status() {
    let (url, _receiver) = spawn_receiver(503).await;
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

    let resp = transport.post_json(&url, &common::receipt()).await.unwrap();

    assert!(!resp.is_success());
    assert_eq!(resp.status, 503);
    assert_eq!(resp.reason, "Service Unavailable");
}

#[tokio::test]
async fn http_transport_unreachable_endpoint() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
    let err = transport
        .post_json(&format!("http://{addr}/hook"), &common::receipt())
        .await
        .unwrap_err();

    assert!(err.message.starts_with("Webhook request failed"));
}

/// Accepts one request, then answers 200 with a body shorter than its
/// declared length and closes the connection.
async fn spawn_truncating_receiver() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 100\r\n\r\npartial")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{addr}/hook")
}

#[tokio::test]
async fn http_transport_records_unreadable_body() {
    let url = spawn_truncating_receiver().await;
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

    let resp = transport.post_json(&url, &common::receipt()).await.unwrap();

    assert_eq!(resp.status, 200);
    assert!(resp.body.starts_with("<failed to read response body:"));
}
