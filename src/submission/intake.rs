use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::SubmissionStore;
use crate::delivery::{DeliveryOutcome, Dispatcher};
use crate::error::IntakeError;
use crate::models::{FormType, NewSubmission};

use super::validator::Validator;

/// Entry point for a user submission: validate, back up, then dispatch.
pub struct SubmissionIntake {
    store: Arc<dyn SubmissionStore>,
    dispatcher: Arc<Dispatcher>,
    validator: Arc<dyn Validator>,
}

/// Handle returned once the backup row exists. Delivery runs on its own task.
pub struct IntakeTicket {
    pub id: Uuid,
    delivery: JoinHandle<DeliveryOutcome>,
}

impl IntakeTicket {
    /// Wait for the automated delivery loop to finish.
    pub async fn outcome(self) -> DeliveryOutcome {
        match self.delivery.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Delivery task for submission {} failed: {e}", self.id);
                DeliveryOutcome {
                    success: false,
                    attempts: 0,
                    last_error: Some(format!("delivery task failed: {e}")),
                    last_attempt_number: 0,
                }
            }
        }
    }
}

impl SubmissionIntake {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        dispatcher: Arc<Dispatcher>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            validator,
        }
    }

    pub async fn submit(
        &self,
        form_type: FormType,
        payload: serde_json::Value,
        submitter: Option<String>,
    ) -> Result<IntakeTicket, IntakeError> {
        let missing = self.validator.validate(form_type, &payload);
        if !missing.is_empty() {
            tracing::debug!("Rejected {form_type} submission, missing: {missing:?}");
            return Err(IntakeError::Validation(missing));
        }

        // No network attempt happens without this row.
        let submission = self
            .store
            .create(NewSubmission::new(form_type, payload, submitter))
            .await
            .map_err(IntakeError::BackupWrite)?;

        tracing::info!(
            "Stored {} submission {} for '{}'",
            submission.form_type,
            submission.id,
            submission.client_name
        );

        let id = submission.id;
        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();
        let max_attempts = dispatcher.max_attempts();
        // Taken before spawning so nothing else can start on this id first.
        let guard = dispatcher.locks().acquire(id).await;
        let delivery = tokio::spawn(async move {
            // The recovery sweeper may have claimed the row between the backup
            // write and the lock; only the copy read under the lock counts.
            let current = match store.get(id).await {
                Ok(Some(row)) => row,
                Ok(None) => submission,
                Err(e) => {
                    tracing::warn!("Failed to reload submission {id} before dispatch: {e}");
                    submission
                }
            };
            if current.webhook_sent {
                tracing::info!("Submission {id} was already dispatched, skipping");
                return DeliveryOutcome {
                    success: current.webhook_success,
                    attempts: 0,
                    last_error: (!current.webhook_success)
                        .then(|| "already dispatched by another delivery".to_string()),
                    last_attempt_number: current.retry_count,
                };
            }
            dispatcher.deliver(&current, max_attempts, &guard).await
        });

        Ok(IntakeTicket { id, delivery })
    }

    /// Submit and wait for the automated outcome.
    pub async fn submit_and_wait(
        &self,
        form_type: FormType,
        payload: serde_json::Value,
        submitter: Option<String>,
    ) -> Result<(Uuid, DeliveryOutcome), IntakeError> {
        let ticket = self.submit(form_type, payload, submitter).await?;
        let id = ticket.id;
        Ok((id, ticket.outcome().await))
    }
}
