use std::sync::Arc;

use crate::config::DeliveryConfig;
use crate::db::{AttemptLog, SubmissionStore};
use crate::models::{AttemptOrigin, NewAttempt, Submission, SubmissionUpdate};

use super::clock::{Clock, LinearBackoff};
use super::locks::{DeliveryGuard, DeliveryLocks};
use super::transport::WebhookTransport;
use super::DeliveryOutcome;

/// Runs the bounded retry loop against the webhook endpoint.
///
/// Every attempt appends one record to the attempt log and then updates the
/// submission row. The two writes are independent: a failure of either is
/// reported on the tracing side-channel and never stops the loop.
///
/// Callers must hold the submission's [`DeliveryGuard`] while a delivery runs;
/// the dispatcher itself does not serialize calls for the same id.
pub struct Dispatcher {
    submissions: Arc<dyn SubmissionStore>,
    attempts: Arc<dyn AttemptLog>,
    transport: Arc<dyn WebhookTransport>,
    clock: Arc<dyn Clock>,
    endpoint_url: String,
    max_attempts: u32,
    backoff: LinearBackoff,
    locks: DeliveryLocks,
}

struct AttemptResult {
    http_status: Option<i32>,
    response_body: String,
    error_message: Option<String>,
    success: bool,
}

impl Dispatcher {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        attempts: Arc<dyn AttemptLog>,
        transport: Arc<dyn WebhookTransport>,
        clock: Arc<dyn Clock>,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            submissions,
            attempts,
            transport,
            clock,
            endpoint_url: config.webhook_url.clone(),
            max_attempts: config.max_attempts.max(1),
            backoff: LinearBackoff::new(config.backoff_base),
            locks: DeliveryLocks::new(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn locks(&self) -> &DeliveryLocks {
        &self.locks
    }

    pub fn try_lock(&self, submission: &Submission) -> Option<DeliveryGuard> {
        self.locks.try_acquire(submission.id)
    }

    /// Automated delivery: up to `max_attempts` tries, stopping at the first success.
    pub async fn deliver(
        &self,
        submission: &Submission,
        max_attempts: u32,
        guard: &DeliveryGuard,
    ) -> DeliveryOutcome {
        debug_assert_eq!(guard.id(), submission.id, "delivery guard held for another submission");
        self.run(submission, max_attempts, AttemptOrigin::Automated)
            .await
    }

    /// Manual replay: a single attempt whose number continues from the stored
    /// retry count.
    pub async fn replay(&self, submission: &Submission, guard: &DeliveryGuard) -> DeliveryOutcome {
        debug_assert_eq!(guard.id(), submission.id, "delivery guard held for another submission");
        self.run(submission, 1, AttemptOrigin::Replay).await
    }

    async fn run(
        &self,
        submission: &Submission,
        max_attempts: u32,
        origin: AttemptOrigin,
    ) -> DeliveryOutcome {
        let first_number = submission.next_attempt_number();
        let mut outcome = DeliveryOutcome {
            success: false,
            attempts: 0,
            last_error: None,
            last_attempt_number: submission.retry_count,
        };

        for k in 1..=max_attempts.max(1) {
            let delay = self.backoff.delay_before(k);
            if !delay.is_zero() {
                tracing::debug!(
                    "Submission {} waiting {}s before attempt {k}",
                    submission.id,
                    delay.as_secs_f64()
                );
                self.clock.sleep(delay).await;
            }

            let attempt_number = first_number + (k as i32 - 1);
            let result = self.attempt(submission, origin).await;

            outcome.attempts = k;
            outcome.last_attempt_number = attempt_number;
            outcome.success = result.success;
            outcome.last_error = result.error_message.clone();

            self.record(submission, attempt_number, origin, &result).await;

            if result.success {
                tracing::info!(
                    "Submission {} delivered on attempt {attempt_number}",
                    submission.id
                );
                return outcome;
            }

            tracing::warn!(
                "Submission {} attempt {attempt_number} failed: {}",
                submission.id,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        tracing::error!(
            "Submission {} not delivered after {} attempt(s); needs manual reconciliation",
            submission.id,
            outcome.attempts
        );
        outcome
    }

    async fn attempt(&self, submission: &Submission, origin: AttemptOrigin) -> AttemptResult {
        let prefix = match origin {
            AttemptOrigin::Automated => "",
            AttemptOrigin::Replay => "Manual retry - ",
        };

        match self
            .transport
            .post_json(&self.endpoint_url, &submission.payload)
            .await
        {
            Ok(resp) if resp.is_success() => AttemptResult {
                http_status: Some(i32::from(resp.status)),
                response_body: resp.body,
                error_message: None,
                success: true,
            },
            Ok(resp) => AttemptResult {
                http_status: Some(i32::from(resp.status)),
                error_message: Some(format!("{prefix}HTTP {}: {}", resp.status, resp.reason)),
                response_body: resp.body,
                success: false,
            },
            Err(e) => AttemptResult {
                http_status: None,
                response_body: String::new(),
                error_message: Some(format!("{prefix}{e}")),
                success: false,
            },
        }
    }

    /// Log append first, then the submission update. Neither failure is fatal.
    async fn record(
        &self,
        submission: &Submission,
        attempt_number: i32,
        origin: AttemptOrigin,
        result: &AttemptResult,
    ) {
        let entry = NewAttempt {
            submission_id: Some(submission.id),
            payload: submission.payload.clone(),
            endpoint_url: self.endpoint_url.clone(),
            http_status: result.http_status,
            response_body: result.response_body.clone(),
            error_message: result.error_message.clone(),
            attempt_number,
            submitter: submission.submitter.clone(),
            origin,
            success: result.success,
        };

        if let Err(e) = self.attempts.append(entry).await {
            tracing::error!(
                "Failed to append attempt {attempt_number} for submission {}: {e}",
                submission.id
            );
        }

        let now = self.clock.now();
        let update = SubmissionUpdate {
            webhook_sent: Some(true),
            webhook_success: Some(result.success),
            retry_count: Some(attempt_number),
            last_retry_at: (!result.success || attempt_number > 1).then_some(now),
        };

        if let Err(e) = self.submissions.update(submission.id, update).await {
            tracing::error!(
                "Failed to update submission {} after attempt {attempt_number}: {e}",
                submission.id
            );
        }
    }
}
