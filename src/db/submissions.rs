use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewSubmission, Submission, SubmissionUpdate};

use super::{SubmissionCounts, SubmissionQuery, SubmissionStore};

#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let submission = sqlx::query_as::<_, Submission>(
            "INSERT INTO submissions (id, form_type, client_name, payload, submitter)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.form_type.as_str())
        .bind(&new.client_name)
        .bind(&new.payload)
        .bind(&new.submitter)
        .fetch_one(&self.pool)
        .await?;
        Ok(submission)
    }

    async fn update(&self, id: Uuid, update: SubmissionUpdate) -> Result<Submission, StoreError> {
        // COALESCE keeps unnamed fields; OR / GREATEST keep the monotonic ones monotonic.
        let submission = sqlx::query_as::<_, Submission>(
            "UPDATE submissions
             SET webhook_sent = webhook_sent OR COALESCE($2, webhook_sent),
                 webhook_success = COALESCE($3, webhook_success),
                 retry_count = GREATEST(retry_count, COALESCE($4, retry_count)),
                 last_retry_at = COALESCE($5, last_retry_at),
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.webhook_sent)
        .bind(update.webhook_success)
        .bind(update.retry_count)
        .bind(update.last_retry_at)
        .fetch_optional(&self.pool)
        .await?;

        submission.ok_or(StoreError::NotFound)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let submission = sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(submission)
    }

    async fn list(&self, query: &SubmissionQuery) -> Result<Vec<Submission>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM submissions WHERE TRUE");

        if let Some(success) = query.webhook_success {
            builder.push(" AND webhook_success = ").push_bind(success);
        }
        if let Some(sent) = query.webhook_sent {
            builder.push(" AND webhook_sent = ").push_bind(sent);
        }
        if let Some(before) = query.created_before {
            builder.push(" AND created_at < ").push_bind(before);
        }

        let order = if query.newest_first { "DESC" } else { "ASC" };
        builder
            .push(format!(" ORDER BY created_at {order}, id {order} LIMIT "))
            .push_bind(query.limit);

        let submissions = builder
            .build_query_as::<Submission>()
            .fetch_all(&self.pool)
            .await?;
        Ok(submissions)
    }

    async fn count_by_state(&self) -> Result<SubmissionCounts, StoreError> {
        let row: (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE webhook_success),
                    COUNT(*) FILTER (WHERE NOT webhook_success)
             FROM submissions",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SubmissionCounts {
            total: row.0,
            delivered: row.1,
            failed: row.2,
        })
    }
}
