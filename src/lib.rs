pub mod auth;
pub mod config;
pub mod console;
pub mod db;
pub mod delivery;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod submission;
pub mod worker;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::console::ReconciliationConsole;
use crate::db::{AttemptLog, PgAttemptLog, PgSubmissionStore, SubmissionStore};
use crate::delivery::{Clock, Dispatcher, HttpTransport, SystemClock, WebhookTransport};
use crate::state::{AppState, SharedState};
use crate::submission::{RequiredFieldsValidator, SubmissionIntake, Validator};

/// External collaborators the delivery subsystem is built on.
pub struct Services {
    pub submissions: Arc<dyn SubmissionStore>,
    pub attempts: Arc<dyn AttemptLog>,
    pub transport: Arc<dyn WebhookTransport>,
    pub clock: Arc<dyn Clock>,
    pub validator: Arc<dyn Validator>,
}

impl Services {
    /// Postgres stores, reqwest transport, wall clock.
    pub fn production(pool: PgPool, config: &Config) -> Result<Self, String> {
        let transport = HttpTransport::new(config.delivery.request_timeout)?;
        Ok(Self {
            submissions: Arc::new(PgSubmissionStore::new(pool.clone())),
            attempts: Arc::new(PgAttemptLog::new(pool)),
            transport: Arc::new(transport),
            clock: Arc::new(SystemClock),
            validator: Arc::new(RequiredFieldsValidator::default()),
        })
    }
}

pub fn build_state(services: Services, config: Config) -> SharedState {
    let dispatcher = Arc::new(Dispatcher::new(
        services.submissions.clone(),
        services.attempts.clone(),
        services.transport,
        services.clock,
        &config.delivery,
    ));

    let intake = SubmissionIntake::new(
        services.submissions.clone(),
        dispatcher.clone(),
        services.validator,
    );

    let console = ReconciliationConsole::new(
        services.submissions.clone(),
        services.attempts,
        dispatcher.clone(),
    );

    Arc::new(AppState {
        config,
        submissions: services.submissions,
        dispatcher,
        intake,
        console,
    })
}

pub fn build_app(services: Services, config: Config) -> (Router, SharedState) {
    let state = build_state(services, config);
    let body_limit = state.config.max_body_size;

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
