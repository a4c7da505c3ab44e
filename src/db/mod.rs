pub mod attempt_log;
pub mod memory;
pub mod submissions;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttemptRecord, NewAttempt, NewSubmission, Submission, SubmissionUpdate};

pub use attempt_log::PgAttemptLog;
pub use memory::MemoryStore;
pub use submissions::PgSubmissionStore;

pub const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct SubmissionQuery {
    pub webhook_success: Option<bool>,
    pub webhook_sent: Option<bool>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: i64,
    pub newest_first: bool,
}

impl Default for SubmissionQuery {
    fn default() -> Self {
        Self {
            webhook_success: None,
            webhook_sent: None,
            created_before: None,
            limit: DEFAULT_LIST_LIMIT,
            newest_first: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptQuery {
    pub success: Option<bool>,
    pub submission_id: Option<Uuid>,
    pub limit: i64,
    pub newest_first: bool,
}

impl Default for AttemptQuery {
    fn default() -> Self {
        Self {
            success: None,
            submission_id: None,
            limit: DEFAULT_LIST_LIMIT,
            newest_first: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SubmissionCounts {
    pub total: i64,
    pub delivered: i64,
    pub failed: i64,
}

/// Durable record of each submission's delivery state.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError>;

    /// `retry_count` never decreases and `webhook_sent` never reverts to false,
    /// whatever the update asks for.
    async fn update(&self, id: Uuid, update: SubmissionUpdate) -> Result<Submission, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    async fn list(&self, query: &SubmissionQuery) -> Result<Vec<Submission>, StoreError>;

    async fn count_by_state(&self) -> Result<SubmissionCounts, StoreError>;
}

/// Append-only log of delivery attempts.
#[async_trait]
pub trait AttemptLog: Send + Sync {
    async fn append(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError>;

    async fn list(&self, query: &AttemptQuery) -> Result<Vec<AttemptRecord>, StoreError>;
}
