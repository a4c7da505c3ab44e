pub mod csv;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{AttemptLog, AttemptQuery, SubmissionQuery, SubmissionStore};
use crate::delivery::{DeliveryOutcome, Dispatcher};
use crate::error::{ReplayError, StoreError};
use crate::models::{AttemptRecord, Submission};

/// Recent-attempt window used for the failed-attempt figure in [`Summary`].
const SUMMARY_ATTEMPT_WINDOW: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Submissions,
    Attempts,
}

impl Collection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim_end_matches(".csv") {
            "submissions" => Some(Collection::Submissions),
            "attempts" | "attempt_log" => Some(Collection::Attempts),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Submissions => "submissions.csv",
            Collection::Attempts => "attempt_log.csv",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    pub submission: Submission,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub total: i64,
    pub delivered: i64,
    pub failed: i64,
    pub recent_failed_attempts: i64,
}

/// Operator view over both stores, plus manual replay.
pub struct ReconciliationConsole {
    submissions: Arc<dyn SubmissionStore>,
    attempts: Arc<dyn AttemptLog>,
    dispatcher: Arc<Dispatcher>,
}

impl ReconciliationConsole {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        attempts: Arc<dyn AttemptLog>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            submissions,
            attempts,
            dispatcher,
        }
    }

    pub async fn list_failed(&self, limit: i64) -> Result<Vec<Submission>, StoreError> {
        self.list_by_success(Some(false), limit).await
    }

    pub async fn list_successful(&self, limit: i64) -> Result<Vec<Submission>, StoreError> {
        self.list_by_success(Some(true), limit).await
    }

    pub async fn list_all(&self, limit: i64) -> Result<Vec<Submission>, StoreError> {
        self.list_by_success(None, limit).await
    }

    async fn list_by_success(
        &self,
        webhook_success: Option<bool>,
        limit: i64,
    ) -> Result<Vec<Submission>, StoreError> {
        let query = SubmissionQuery {
            webhook_success,
            limit,
            ..SubmissionQuery::default()
        };
        self.submissions.list(&query).await
    }

    pub async fn list_attempts(&self, query: &AttemptQuery) -> Result<Vec<AttemptRecord>, StoreError> {
        self.attempts.list(query).await
    }

    pub async fn detail(&self, id: Uuid) -> Result<Option<SubmissionDetail>, StoreError> {
        let Some(submission) = self.submissions.get(id).await? else {
            return Ok(None);
        };

        let attempts = self
            .attempts
            .list(&AttemptQuery {
                submission_id: Some(id),
                limit: i64::MAX,
                newest_first: false,
                ..AttemptQuery::default()
            })
            .await?;

        Ok(Some(SubmissionDetail {
            submission,
            attempts,
        }))
    }

    pub async fn summary(&self) -> Result<Summary, StoreError> {
        let counts = self.submissions.count_by_state().await?;
        let recent_failed_attempts = self
            .attempts
            .list(&AttemptQuery {
                limit: SUMMARY_ATTEMPT_WINDOW,
                ..AttemptQuery::default()
            })
            .await?
            .iter()
            .filter(|a| !a.success)
            .count() as i64;

        Ok(Summary {
            total: counts.total,
            delivered: counts.delivered,
            failed: counts.failed,
            recent_failed_attempts,
        })
    }

    /// Single manual attempt for a submission that has not been delivered.
    /// Delivered submissions are rejected rather than re-sent.
    pub async fn replay(&self, id: Uuid) -> Result<DeliveryOutcome, ReplayError> {
        let guard = self
            .dispatcher
            .locks()
            .try_acquire(id)
            .ok_or(ReplayError::InFlight)?;

        // Loaded under the lock so the attempt number reflects any delivery
        // that finished just before.
        let submission = self
            .submissions
            .get(id)
            .await?
            .ok_or(ReplayError::NotFound)?;

        if submission.webhook_success {
            return Err(ReplayError::AlreadyDelivered);
        }

        tracing::info!(
            "Manual replay of submission {} as attempt {}",
            submission.id,
            submission.next_attempt_number()
        );

        Ok(self.dispatcher.replay(&submission, &guard).await)
    }

    pub async fn export_csv(&self, collection: Collection) -> Result<String, StoreError> {
        match collection {
            Collection::Submissions => {
                let rows = self
                    .submissions
                    .list(&SubmissionQuery {
                        limit: i64::MAX,
                        ..SubmissionQuery::default()
                    })
                    .await?;
                Ok(csv::to_csv(&rows))
            }
            Collection::Attempts => {
                let rows = self
                    .attempts
                    .list(&AttemptQuery {
                        limit: i64::MAX,
                        ..AttemptQuery::default()
                    })
                    .await?;
                Ok(csv::to_csv(&rows))
            }
        }
    }
}
