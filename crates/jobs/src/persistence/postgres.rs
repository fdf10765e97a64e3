//! PostgreSQL implementation of JobStore
//!
//! - Job mutations run under `SELECT ... FOR UPDATE` on the job row
//! - Job creation takes a transaction-scoped advisory lock on the connection
//! - A partial unique index backs the one-live-job-per-connection rule

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, error, instrument};

use super::store::*;
use crate::error::JobError;
use crate::model::{
    Attempt, AttemptRef, AttemptStatus, ConnectionId, FailureSummary, Job, JobId, JobStatus,
    SyncOutput,
};

/// PostgreSQL implementation of JobStore
///
/// # Example
///
/// ```ignore
/// use syncflow_jobs::PostgresJobStore;
///
/// let store = PostgresJobStore::connect("postgres://localhost/syncflow", 5).await?;
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_error)?;
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_attempts(
        tx: &mut Transaction<'_, Postgres>,
        job_id: JobId,
    ) -> Result<Vec<Attempt>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, attempt_number, status, sync_output, failure_summary,
                   created_at, updated_at, ended_at
            FROM attempts
            WHERE job_id = $1
            ORDER BY attempt_number
            "#,
        )
        .bind(job_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(store_error)?;

        rows.iter().map(attempt_from_row).collect()
    }

    async fn write_job(
        tx: &mut Transaction<'_, Postgres>,
        before: &Job,
        after: &Job,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                failure_reason = $3,
                updated_at = $4,
                started_at = $5,
                ended_at = $6
            WHERE id = $1
            "#,
        )
        .bind(after.id)
        .bind(after.status.as_str())
        .bind(&after.failure_reason)
        .bind(after.updated_at)
        .bind(after.started_at)
        .bind(after.ended_at)
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;

        for attempt in &after.attempts {
            if before.attempt(AttemptRef::Id(attempt.id)) == Some(attempt) {
                continue;
            }

            let sync_output = attempt
                .sync_output
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let failure_summary = attempt
                .failure_summary
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO attempts (
                    id, job_id, attempt_number, status, sync_output, failure_summary,
                    created_at, updated_at, ended_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE
                SET status = EXCLUDED.status,
                    sync_output = EXCLUDED.sync_output,
                    failure_summary = EXCLUDED.failure_summary,
                    updated_at = EXCLUDED.updated_at,
                    ended_at = EXCLUDED.ended_at
                "#,
            )
            .bind(attempt.id)
            .bind(after.id)
            .bind(attempt.number)
            .bind(attempt.status.as_str())
            .bind(&sync_output)
            .bind(&failure_summary)
            .bind(attempt.created_at)
            .bind(attempt.updated_at)
            .bind(attempt.ended_at)
            .execute(&mut **tx)
            .await
            .map_err(store_error)?;
        }

        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self))]
    async fn create_job(&self, connection_id: ConnectionId) -> Result<Job, JobError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // Serializes creation per connection
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::uuid::text))")
            .bind(connection_id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let live = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE connection_id = $1 AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(connection_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?;

        if let Some(row) = live {
            return Err(JobError::ConflictingJob {
                connection_id,
                job_id: row.get("id"),
            });
        }

        let row = sqlx::query(
            r#"
            INSERT INTO jobs (connection_id, status)
            VALUES ($1, 'pending')
            RETURNING id, connection_id, status, failure_reason,
                      created_at, updated_at, started_at, ended_at
            "#,
        )
        .bind(connection_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create job: {}", e);
            store_error(e)
        })?;

        let job = job_from_row(&row, Vec::new())?;
        tx.commit().await.map_err(store_error)?;

        debug!(job_id = job.id, %connection_id, "created job");
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn get_job(&self, job_id: JobId) -> Result<Job, JobError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let row = sqlx::query(
            r#"
            SELECT id, connection_id, status, failure_reason,
                   created_at, updated_at, started_at, ended_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?
        .ok_or(JobError::JobNotFound(job_id))?;

        let attempts = Self::load_attempts(&mut tx, job_id).await?;
        let job = job_from_row(&row, attempts)?;
        tx.commit().await.map_err(store_error)?;
        Ok(job)
    }

    #[instrument(skip(self, filter))]
    async fn list_jobs(
        &self,
        connection_id: ConnectionId,
        filter: JobFilter,
    ) -> Result<Vec<Job>, JobError> {
        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let rows = sqlx::query(
            r#"
            SELECT id, connection_id, status, failure_reason,
                   created_at, updated_at, started_at, ended_at
            FROM jobs
            WHERE connection_id = $1
              AND (cardinality($2::text[]) = 0 OR status = ANY($2))
            ORDER BY id
            "#,
        )
        .bind(connection_id)
        .bind(&statuses)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            let job_id: JobId = row.get("id");
            let attempts = Self::load_attempts(&mut tx, job_id).await?;
            jobs.push(job_from_row(row, attempts)?);
        }
        tx.commit().await.map_err(store_error)?;
        Ok(jobs)
    }

    #[instrument(skip(self))]
    async fn allocate_attempt_id(&self) -> Result<i32, JobError> {
        let row = sqlx::query("SELECT nextval(pg_get_serial_sequence('attempts', 'id'))::INT4 AS id")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.get("id"))
    }

    #[instrument(skip(self, mutation))]
    async fn update_job(
        &self,
        job_id: JobId,
        mutation: JobMutation,
    ) -> Result<JobUpdate, JobError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let row = sqlx::query(
            r#"
            SELECT id, connection_id, status, failure_reason,
                   created_at, updated_at, started_at, ended_at
            FROM jobs
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?
        .ok_or(JobError::JobNotFound(job_id))?;

        let attempts = Self::load_attempts(&mut tx, job_id).await?;
        let before = job_from_row(&row, attempts)?;

        let mut job = before.clone();
        let transition = mutation(&mut job)?;

        if transition.is_applied() {
            Self::write_job(&mut tx, &before, &job).await?;
            tx.commit().await.map_err(store_error)?;
            debug!(job_id, status = %job.status, "updated job");
        } else {
            tx.rollback().await.map_err(store_error)?;
        }

        Ok(JobUpdate { job, transition })
    }
}

fn store_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // serialization_failure, deadlock_detected, unique_violation
            Some("40001") | Some("40P01") | Some("23505") => {
                StoreError::ConcurrencyConflict(db.message().to_string())
            }
            _ => StoreError::Database(e.to_string()),
        },
        _ => StoreError::Database(e.to_string()),
    }
}

fn job_from_row(row: &PgRow, attempts: Vec<Attempt>) -> Result<Job, StoreError> {
    let status: String = row.get("status");
    Ok(Job {
        id: row.get("id"),
        connection_id: row.get("connection_id"),
        status: JobStatus::parse(&status)
            .ok_or_else(|| StoreError::Serialization(format!("unknown job status: {status}")))?,
        attempts,
        failure_reason: row.get("failure_reason"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
    })
}

fn attempt_from_row(row: &PgRow) -> Result<Attempt, StoreError> {
    let status: String = row.get("status");
    let sync_output: Option<serde_json::Value> = row.get("sync_output");
    let failure_summary: Option<serde_json::Value> = row.get("failure_summary");

    Ok(Attempt {
        id: row.get("id"),
        number: row.get("attempt_number"),
        status: AttemptStatus::parse(&status).ok_or_else(|| {
            StoreError::Serialization(format!("unknown attempt status: {status}"))
        })?,
        sync_output: sync_output.map(SyncOutput::new),
        failure_summary: failure_summary
            .map(serde_json::from_value::<FailureSummary>)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        ended_at: row.get("ended_at"),
    })
}
