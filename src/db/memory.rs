use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttemptRecord, NewAttempt, NewSubmission, Submission, SubmissionUpdate};

use super::{AttemptLog, AttemptQuery, SubmissionCounts, SubmissionQuery, SubmissionStore};

/// Process-local store implementing both collections. Rows are kept in
/// insertion order, which is also `created_at` order.
#[derive(Default)]
pub struct MemoryStore {
    submissions: Mutex<Vec<Submission>>,
    attempts: Mutex<Vec<AttemptRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn submissions(&self) -> Result<std::sync::MutexGuard<'_, Vec<Submission>>, StoreError> {
        self.submissions
            .lock()
            .map_err(|_| StoreError::Unavailable("submission table lock poisoned".to_string()))
    }

    fn attempts(&self) -> Result<std::sync::MutexGuard<'_, Vec<AttemptRecord>>, StoreError> {
        self.attempts
            .lock()
            .map_err(|_| StoreError::Unavailable("attempt log lock poisoned".to_string()))
    }
}

fn take_ordered<T: Clone>(rows: Vec<&T>, newest_first: bool, limit: i64) -> Vec<T> {
    let limit = usize::try_from(limit).unwrap_or(0);
    if newest_first {
        rows.into_iter().rev().take(limit).cloned().collect()
    } else {
        rows.into_iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let now = Utc::now();
        let submission = Submission {
            id: Uuid::now_v7(),
            form_type: new.form_type,
            client_name: new.client_name,
            payload: new.payload,
            submitter: new.submitter,
            webhook_sent: false,
            webhook_success: false,
            retry_count: 0,
            last_retry_at: None,
            created_at: now,
            updated_at: now,
        };
        self.submissions()?.push(submission.clone());
        Ok(submission)
    }

    async fn update(&self, id: Uuid, update: SubmissionUpdate) -> Result<Submission, StoreError> {
        let mut rows = self.submissions()?;
        let row = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound)?;

        if let Some(sent) = update.webhook_sent {
            row.webhook_sent |= sent;
        }
        if let Some(success) = update.webhook_success {
            row.webhook_success = success;
        }
        if let Some(count) = update.retry_count {
            row.retry_count = row.retry_count.max(count);
        }
        if let Some(at) = update.last_retry_at {
            row.last_retry_at = Some(at);
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self.submissions()?.iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self, query: &SubmissionQuery) -> Result<Vec<Submission>, StoreError> {
        let rows = self.submissions()?;
        let matching = rows
            .iter()
            .filter(|s| query.webhook_success.is_none_or(|v| s.webhook_success == v))
            .filter(|s| query.webhook_sent.is_none_or(|v| s.webhook_sent == v))
            .filter(|s| query.created_before.is_none_or(|t| s.created_at < t))
            .collect();
        Ok(take_ordered(matching, query.newest_first, query.limit))
    }

    async fn count_by_state(&self) -> Result<SubmissionCounts, StoreError> {
        let rows = self.submissions()?;
        let delivered = rows.iter().filter(|s| s.webhook_success).count() as i64;
        let total = rows.len() as i64;
        Ok(SubmissionCounts {
            total,
            delivered,
            failed: total - delivered,
        })
    }
}

#[async_trait]
impl AttemptLog for MemoryStore {
    async fn append(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        let record = AttemptRecord {
            id: Uuid::now_v7(),
            submission_id: attempt.submission_id,
            payload: attempt.payload,
            endpoint_url: attempt.endpoint_url,
            http_status: attempt.http_status,
            response_body: attempt.response_body,
            error_message: attempt.error_message,
            attempt_number: attempt.attempt_number,
            submitter: attempt.submitter,
            origin: attempt.origin,
            success: attempt.success,
            created_at: Utc::now(),
        };
        self.attempts()?.push(record.clone());
        Ok(record)
    }

    async fn list(&self, query: &AttemptQuery) -> Result<Vec<AttemptRecord>, StoreError> {
        let rows = self.attempts()?;
        let matching = rows
            .iter()
            .filter(|a| query.success.is_none_or(|v| a.success == v))
            .filter(|a| {
                query
                    .submission_id
                    .is_none_or(|id| a.submission_id == Some(id))
            })
            .collect();
        Ok(take_ordered(matching, query.newest_first, query.limit))
    }
}
