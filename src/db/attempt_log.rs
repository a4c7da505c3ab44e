use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttemptRecord, NewAttempt};

use super::{AttemptLog, AttemptQuery};

/// Postgres attempt log. Only ever INSERTs.
#[derive(Clone)]
pub struct PgAttemptLog {
    pool: PgPool,
}

impl PgAttemptLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptLog for PgAttemptLog {
    async fn append(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        let record = sqlx::query_as::<_, AttemptRecord>(
            "INSERT INTO attempt_log (id, submission_id, payload, endpoint_url, http_status,
                                      response_body, error_message, attempt_number, submitter,
                                      origin, success)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(attempt.submission_id)
        .bind(&attempt.payload)
        .bind(&attempt.endpoint_url)
        .bind(attempt.http_status)
        .bind(&attempt.response_body)
        .bind(&attempt.error_message)
        .bind(attempt.attempt_number)
        .bind(&attempt.submitter)
        .bind(attempt.origin.as_str())
        .bind(attempt.success)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(&self, query: &AttemptQuery) -> Result<Vec<AttemptRecord>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM attempt_log WHERE TRUE");

        if let Some(success) = query.success {
            builder.push(" AND success = ").push_bind(success);
        }
        if let Some(submission_id) = query.submission_id {
            builder.push(" AND submission_id = ").push_bind(submission_id);
        }

        let order = if query.newest_first { "DESC" } else { "ASC" };
        builder
            .push(format!(" ORDER BY created_at {order}, id {order} LIMIT "))
            .push_bind(query.limit);

        let records = builder
            .build_query_as::<AttemptRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}
