use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Submitter;
use crate::error::AppError;
use crate::models::FormType;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateSubmission {
    pub form_type: String,
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
pub struct SubmitParams {
    pub wait: Option<bool>,
}

pub async fn create(
    submitter: Submitter,
    State(state): State<SharedState>,
    Query(params): Query<SubmitParams>,
    body: Result<Json<CreateSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form_type =
        FormType::try_from(req.form_type).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let ticket = state
        .intake
        .submit(form_type, req.payload, submitter.identity)
        .await?;
    let id = ticket.id;

    if !params.wait.unwrap_or(true) {
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "submission_id": id,
                "status": "pending",
                "message": "Submission stored; delivery in progress",
            })),
        ));
    }

    let outcome = ticket.outcome().await;
    let message = if outcome.success {
        "Submission delivered".to_string()
    } else {
        format!(
            "Submission {id} is safely stored but could not be delivered after {} attempt(s); it will be reconciled manually",
            outcome.attempts
        )
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "submission_id": id,
            "delivered": outcome.success,
            "attempts": outcome.attempts,
            "last_error": outcome.last_error,
            "message": message,
        })),
    ))
}
