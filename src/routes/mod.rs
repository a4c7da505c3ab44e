pub mod admin;
pub mod submissions;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Intake
        .route("/api/v1/submissions", post(submissions::create))
        // Reconciliation console
        .route("/api/v1/admin/summary", get(admin::summary))
        .route("/api/v1/admin/submissions", get(admin::list_submissions))
        .route("/api/v1/admin/submissions/{id}", get(admin::get_submission))
        .route("/api/v1/admin/submissions/{id}/replay", post(admin::replay))
        .route("/api/v1/admin/attempts", get(admin::list_attempts))
        .route("/api/v1/admin/export/{collection}", get(admin::export))
}
