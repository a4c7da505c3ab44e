use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub id: Uuid,
    /// Informational only; the log stays writable without a matching submission row.
    pub submission_id: Option<Uuid>,
    /// Copy of the payload as it was sent.
    pub payload: serde_json::Value,
    pub endpoint_url: String,
    pub http_status: Option<i32>,
    pub response_body: String,
    pub error_message: Option<String>,
    pub attempt_number: i32,
    pub submitter: Option<String>,
    #[sqlx(try_from = "String")]
    pub origin: AttemptOrigin,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOrigin {
    Automated,
    Replay,
}

impl AttemptOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOrigin::Automated => "automated",
            AttemptOrigin::Replay => "replay",
        }
    }
}

#[derive(Debug)]
pub struct UnknownOrigin(pub String);

impl std::fmt::Display for UnknownOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown attempt origin: {}", self.0)
    }
}

impl std::error::Error for UnknownOrigin {}

impl TryFrom<String> for AttemptOrigin {
    type Error = UnknownOrigin;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "automated" => Ok(AttemptOrigin::Automated),
            "replay" => Ok(AttemptOrigin::Replay),
            _ => Err(UnknownOrigin(value)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub submission_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub endpoint_url: String,
    pub http_status: Option<i32>,
    pub response_body: String,
    pub error_message: Option<String>,
    pub attempt_number: i32,
    pub submitter: Option<String>,
    pub origin: AttemptOrigin,
    pub success: bool,
}
