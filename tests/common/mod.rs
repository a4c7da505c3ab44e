#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use fieldrelay::auth::jwt::{self, Claims};
use fieldrelay::config::{Config, DeliveryConfig, RecoveryConfig};
use fieldrelay::db::{
    AttemptLog, AttemptQuery, MemoryStore, SubmissionCounts, SubmissionQuery, SubmissionStore,
};
use fieldrelay::delivery::{Clock, TransportError, TransportResponse, WebhookTransport};
use fieldrelay::error::StoreError;
use fieldrelay::models::{AttemptRecord, NewAttempt, NewSubmission, Submission, SubmissionUpdate};
use fieldrelay::state::SharedState;
use fieldrelay::submission::RequiredFieldsValidator;
use fieldrelay::Services;

pub const WEBHOOK_URL: &str = "http://hooks.test/webhook/remitos";
pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";

// ── Transport double ────────────────────────────────────────────

/// Replays a queue of canned results; once empty, every call succeeds with 200.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn push_status(&self, status: u16) {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        self.script.lock().unwrap().push_back(Ok(TransportResponse {
            status,
            reason,
            body: format!("status {status}"),
        }));
    }

    pub fn push_statuses(&self, statuses: &[u16]) {
        for status in statuses {
            self.push_status(*status);
        }
    }

    pub fn push_network_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::from(message)));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(TransportResponse {
                status: 200,
                reason: "OK".to_string(),
                body: "ok".to_string(),
            })
        })
    }
}

// ── Clock double ────────────────────────────────────────────────

/// Records requested sleeps instead of waiting.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

// ── Store with injectable failures ──────────────────────────────

#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_append: AtomicBool,
}

impl FlakyStore {
    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }

    pub async fn submission(&self, id: Uuid) -> Submission {
        SubmissionStore::get(&self.inner, id)
            .await
            .unwrap()
            .expect("submission exists")
    }

    pub async fn all_submissions(&self) -> Vec<Submission> {
        SubmissionStore::list(&self.inner, &SubmissionQuery::default())
            .await
            .unwrap()
    }

    /// Attempts for one submission, oldest first.
    pub async fn attempts_for(&self, id: Uuid) -> Vec<AttemptRecord> {
        AttemptLog::list(
            &self.inner,
            &AttemptQuery {
                submission_id: Some(id),
                newest_first: false,
                ..AttemptQuery::default()
            },
        )
        .await
        .unwrap()
    }

    pub async fn all_attempts(&self) -> Vec<AttemptRecord> {
        AttemptLog::list(&self.inner, &AttemptQuery::default())
            .await
            .unwrap()
    }
}

#[async_trait]
impl SubmissionStore for FlakyStore {
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        Self::check(&self.fail_create, "create")?;
        SubmissionStore::create(&self.inner, new).await
    }

    async fn update(&self, id: Uuid, update: SubmissionUpdate) -> Result<Submission, StoreError> {
        Self::check(&self.fail_update, "update")?;
        SubmissionStore::update(&self.inner, id, update).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        SubmissionStore::get(&self.inner, id).await
    }

    async fn list(&self, query: &SubmissionQuery) -> Result<Vec<Submission>, StoreError> {
        SubmissionStore::list(&self.inner, query).await
    }

    async fn count_by_state(&self) -> Result<SubmissionCounts, StoreError> {
        self.inner.count_by_state().await
    }
}

#[async_trait]
impl AttemptLog for FlakyStore {
    async fn append(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        Self::check(&self.fail_append, "append")?;
        self.inner.append(attempt).await
    }

    async fn list(&self, query: &AttemptQuery) -> Result<Vec<AttemptRecord>, StoreError> {
        AttemptLog::list(&self.inner, query).await
    }
}

// ── Fixtures ────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
        delivery: DeliveryConfig {
            webhook_url: WEBHOOK_URL.to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        },
        recovery: RecoveryConfig {
            interval: Duration::ZERO,
            grace: Duration::ZERO,
        },
    }
}

pub fn work_order() -> Value {
    json!({
        "domicilio": "Av. Siempre Viva 742",
        "localidad": "Rosario",
        "solicitante": "Ferretería Norte",
        "tecnicos": "J. Pérez, M. Gómez",
        "telefono": "3415551234",
        "tareasRealizadas": "Cambio de bomba",
        "horasEmpleadas": "3",
        "trabajoRealizado": "Instalación completa",
        "receptorNombre": "Ana López",
        "receptorDni": "30123456",
        "firma": "data:image/png;base64,iVBORw0KGgo=",
        "aclaraciones": ""
    })
}

pub fn receipt() -> Value {
    json!({
        "clientName": "Panadería Sur",
        "receptorNombre": "Luis Díaz",
        "receptorDni": "28987654",
        "firma": "data:image/png;base64,iVBORw0KGgo=",
        "monto": 1500
    })
}

/// Library-level wiring over the in-memory doubles, no HTTP server.
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<RecordingClock>,
    pub state: SharedState,
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: Config) -> Harness {
    let (services, store, transport, clock) = services();
    let state = fieldrelay::build_state(services, config);
    Harness {
        store,
        transport,
        clock,
        state,
    }
}

fn services() -> (
    Services,
    Arc<FlakyStore>,
    Arc<ScriptedTransport>,
    Arc<RecordingClock>,
) {
    let store = Arc::new(FlakyStore::default());
    let transport = Arc::new(ScriptedTransport::default());
    let clock = Arc::new(RecordingClock::default());

    let services = Services {
        submissions: store.clone(),
        attempts: store.clone(),
        transport: transport.clone(),
        clock: clock.clone(),
        validator: Arc::new(RequiredFieldsValidator::default()),
    };

    (services, store, transport, clock)
}

// ── HTTP test server ────────────────────────────────────────────

/// A running test server backed by the in-memory doubles.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<FlakyStore>,
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<RecordingClock>,
    pub state: SharedState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token(&self, subject: &str, role: &str) -> String {
        let claims = Claims::new(subject, role, chrono::Duration::minutes(15));
        jwt::encode_token(&claims, JWT_SECRET).unwrap()
    }

    pub fn operator_token(&self) -> String {
        self.token("operator-1", "admin")
    }

    pub fn technician_token(&self) -> String {
        self.token("30123456", "technician")
    }

    /// Submit a form, optionally as an authenticated technician.
    pub async fn submit(
        &self,
        form_type: &str,
        payload: &Value,
        token: Option<&str>,
    ) -> (Value, StatusCode) {
        let mut req = self
            .client
            .post(self.url("/api/v1/submissions"))
            .json(&json!({ "form_type": form_type, "payload": payload }));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("submit request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request without a body.
    pub async fn post_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

/// Spawn the app on a random local port.
pub async fn spawn_app() -> TestApp {
    let (services, store, transport, clock) = services();
    let (app, state) = fieldrelay::build_app(services, test_config());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
        store,
        transport,
        clock,
        state,
    }
}
