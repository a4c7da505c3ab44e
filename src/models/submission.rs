use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub form_type: FormType,
    pub client_name: String,
    pub payload: serde_json::Value,
    pub submitter: Option<String>,
    pub webhook_sent: bool,
    pub webhook_success: bool,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn state(&self) -> DeliveryState {
        DeliveryState::from_flags(self.webhook_sent, self.webhook_success)
    }

    /// Attempt number the next delivery attempt will carry.
    pub fn next_attempt_number(&self) -> i32 {
        self.retry_count + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    WorkOrder,
    Receipt,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::WorkOrder => "work_order",
            FormType::Receipt => "receipt",
        }
    }
}

impl std::fmt::Display for FormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct UnknownFormType(pub String);

impl std::fmt::Display for UnknownFormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown form type: {}", self.0)
    }
}

impl std::error::Error for UnknownFormType {}

impl TryFrom<String> for FormType {
    type Error = UnknownFormType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "work_order" => Ok(FormType::WorkOrder),
            "receipt" => Ok(FormType::Receipt),
            _ => Err(UnknownFormType(value)),
        }
    }
}

/// The reachable combinations of `(webhook_sent, webhook_success)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Exhausted,
}

impl DeliveryState {
    pub fn from_flags(webhook_sent: bool, webhook_success: bool) -> Self {
        match (webhook_sent, webhook_success) {
            (_, true) => DeliveryState::Delivered,
            (true, false) => DeliveryState::Exhausted,
            (false, false) => DeliveryState::Pending,
        }
    }
}

/// Fields supplied by intake when the backup row is written.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_type: FormType,
    pub client_name: String,
    pub payload: serde_json::Value,
    pub submitter: Option<String>,
}

impl NewSubmission {
    pub fn new(form_type: FormType, payload: serde_json::Value, submitter: Option<String>) -> Self {
        let client_name = client_name_from(&payload);
        Self {
            form_type,
            client_name,
            payload,
            submitter,
        }
    }
}

/// Partial update. Only `Some` fields are written; `updated_at` is always refreshed.
#[derive(Debug, Clone, Default)]
pub struct SubmissionUpdate {
    pub webhook_sent: Option<bool>,
    pub webhook_success: Option<bool>,
    pub retry_count: Option<i32>,
    pub last_retry_at: Option<DateTime<Utc>>,
}

fn client_name_from(payload: &serde_json::Value) -> String {
    ["clientName", "solicitante"]
        .iter()
        .filter_map(|key| payload.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
