use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failure of either durable store (submissions or attempt log).
#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Database(sqlx::Error),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Database(err) => write!(f, "database error: {err}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

/// The only errors a submitting caller ever sees. Everything after the backup
/// write is absorbed into the submission's own delivery state.
#[derive(Debug)]
pub enum IntakeError {
    Validation(Vec<String>),
    BackupWrite(StoreError),
}

impl std::fmt::Display for IntakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntakeError::Validation(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            IntakeError::BackupWrite(err) => write!(
                f,
                "cannot guarantee durability, submission rejected: {err}"
            ),
        }
    }
}

impl std::error::Error for IntakeError {}

#[derive(Debug)]
pub enum ReplayError {
    NotFound,
    AlreadyDelivered,
    InFlight,
    Store(StoreError),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::NotFound => write!(f, "submission not found"),
            ReplayError::AlreadyDelivered => write!(f, "submission was already delivered"),
            ReplayError::InFlight => write!(f, "a delivery for this submission is in progress"),
            ReplayError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<StoreError> for ReplayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ReplayError::NotFound,
            other => ReplayError::Store(other),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    MissingFields(Vec<String>),
    ServiceUnavailable(String),
    Store(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::MissingFields(fields) => {
                write!(f, "Missing Fields: {}", fields.join(", "))
            }
            AppError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {msg}"),
            AppError::Store(err) => write!(f, "Store Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::MissingFields(fields) => {
                let body = json!({
                    "error": "Missing required fields",
                    "missing_fields": fields,
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response();
            }
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Store(err) => {
                tracing::error!("Store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Store(other),
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(fields) => AppError::MissingFields(fields),
            IntakeError::BackupWrite(err) => {
                tracing::error!("Backup write failed: {err}");
                AppError::ServiceUnavailable(
                    "Cannot guarantee durability, submission rejected".to_string(),
                )
            }
        }
    }
}

impl From<ReplayError> for AppError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::NotFound => AppError::NotFound("Submission not found".to_string()),
            ReplayError::AlreadyDelivered => {
                AppError::Conflict("Submission was already delivered".to_string())
            }
            ReplayError::InFlight => AppError::Conflict(
                "A delivery for this submission is already in progress".to_string(),
            ),
            ReplayError::Store(err) => AppError::Store(err),
        }
    }
}
