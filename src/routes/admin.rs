use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Operator;
use crate::console::{Collection, SubmissionDetail, Summary};
use crate::db::{AttemptQuery, DEFAULT_LIST_LIMIT};
use crate::error::AppError;
use crate::models::{AttemptRecord, Submission};
use crate::state::SharedState;

const MAX_LIST_LIMIT: i64 = 500;

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct AttemptParams {
    pub success: Option<bool>,
    pub submission_id: Option<Uuid>,
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

pub async fn list_submissions(
    _operator: Operator,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Submission>>, AppError> {
    let limit = clamp_limit(params.limit);
    let submissions = match params.status.as_deref().unwrap_or("all") {
        "failed" => state.console.list_failed(limit).await?,
        "successful" => state.console.list_successful(limit).await?,
        "all" => state.console.list_all(limit).await?,
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown status '{other}', expected failed, successful or all"
            )));
        }
    };
    Ok(Json(submissions))
}

pub async fn get_submission(
    _operator: Operator,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionDetail>, AppError> {
    let detail = state
        .console
        .detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;
    Ok(Json(detail))
}

pub async fn replay(
    operator: Operator,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Operator {} requested replay of {id}", operator.identity);

    let outcome = state.console.replay(id).await?;
    let message = if outcome.success {
        "Submission re-sent successfully".to_string()
    } else {
        format!(
            "Replay failed: {}",
            outcome.last_error.as_deref().unwrap_or("unknown error")
        )
    };

    Ok(Json(json!({
        "submission_id": id,
        "delivered": outcome.success,
        "attempt_number": outcome.last_attempt_number,
        "last_error": outcome.last_error,
        "message": message,
    })))
}

pub async fn list_attempts(
    _operator: Operator,
    State(state): State<SharedState>,
    Query(params): Query<AttemptParams>,
) -> Result<Json<Vec<AttemptRecord>>, AppError> {
    let query = AttemptQuery {
        success: params.success,
        submission_id: params.submission_id,
        limit: clamp_limit(params.limit),
        newest_first: true,
    };
    let attempts = state.console.list_attempts(&query).await?;
    Ok(Json(attempts))
}

pub async fn summary(
    _operator: Operator,
    State(state): State<SharedState>,
) -> Result<Json<Summary>, AppError> {
    Ok(Json(state.console.summary().await?))
}

pub async fn export(
    _operator: Operator,
    State(state): State<SharedState>,
    Path(collection): Path<String>,
) -> Result<Response, AppError> {
    let collection = Collection::parse(&collection)
        .ok_or_else(|| AppError::NotFound(format!("Unknown collection '{collection}'")))?;

    let csv = state.console.export_csv(collection).await?;
    let disposition = format!("attachment; filename=\"{}\"", collection.file_name());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
