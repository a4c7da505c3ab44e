use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::config::RecoveryConfig;
use crate::db::{SubmissionQuery, SubmissionStore};
use crate::delivery::Dispatcher;
use crate::error::StoreError;

const SWEEP_BATCH: i64 = 50;

/// Picks up submissions that were backed up but never dispatched, e.g. because
/// the process died between the backup write and the first attempt.
pub struct RecoverySweeper {
    submissions: Arc<dyn SubmissionStore>,
    dispatcher: Arc<Dispatcher>,
    grace: Duration,
}

impl RecoverySweeper {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        dispatcher: Arc<Dispatcher>,
        grace: Duration,
    ) -> Self {
        Self {
            submissions,
            dispatcher,
            grace,
        }
    }

    /// Start the periodic sweep. Returns `None` when the interval is zero.
    pub fn spawn(
        self,
        config: &RecoveryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        if config.interval.is_zero() {
            tracing::info!("Recovery sweeper disabled");
            return None;
        }
        let interval = config.interval;
        Some(tokio::spawn(self.run(interval, shutdown)))
    }

    async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!("Recovery sweeper started (every {}s)", interval.as_secs());

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.sweep_once().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Recovery sweep dispatched {n} stranded submission(s)"),
                Err(e) => tracing::error!("Recovery sweep failed: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::debug!("Recovery sweeper stopped");
    }

    /// Dispatch every pending submission older than the grace period that is
    /// not already being delivered. Returns how many were dispatched.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let grace = chrono::Duration::from_std(self.grace).unwrap_or(chrono::Duration::zero());
        let query = SubmissionQuery {
            webhook_sent: Some(false),
            created_before: Some(Utc::now() - grace),
            limit: SWEEP_BATCH,
            newest_first: false,
            ..SubmissionQuery::default()
        };

        let stranded = self.submissions.list(&query).await?;
        let mut dispatched = 0;

        for candidate in stranded {
            let Some(guard) = self.dispatcher.try_lock(&candidate) else {
                continue;
            };

            let Some(submission) = self.submissions.get(candidate.id).await? else {
                continue;
            };
            if submission.webhook_sent {
                continue;
            }

            tracing::warn!("Recovering stranded submission {}", submission.id);
            self.dispatcher
                .deliver(&submission, self.dispatcher.max_attempts(), &guard)
                .await;
            dispatched += 1;
        }

        Ok(dispatched)
    }
}
