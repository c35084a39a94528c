// SQLite JobQueue Implementation

use async_trait::async_trait;
use sqlx::SqlitePool;
use stella_core::domain::{Job, JobId, JobKind, JobPayload, JobState};
use stella_core::error::{AppError, Result};
use stella_core::port::JobQueue;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) if code.as_ref() == "2067" || code.as_ref() == "1555" => {
                AppError::Conflict(format!("Unique constraint violation: {}", db_err.message()))
            }
            Some(code) if code.as_ref() == "5" => {
                AppError::Database(format!("Database locked (SQLITE_BUSY): {}", db_err.message()))
            }
            Some(code) => AppError::Database(format!(
                "Database error [{}]: {}",
                code.as_ref(),
                db_err.message()
            )),
            None => AppError::Database(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn submit(&self, job: &Job) -> Result<()> {
        let payload = serde_json::to_string(&job.payload)?;
        let result = job.result.as_ref().map(|v| v.to_string());

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, payload, cache_key, state, result, error,
                attempts, max_attempts, run_at,
                created_at, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.kind().as_str())
        .bind(&payload)
        .bind(&job.cache_key)
        .bind(job.state.as_str())
        .bind(&result)
        .bind(&job.error)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.run_at)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_by_cache_key(&self, kind: JobKind, cache_key: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE kind = ? AND cache_key = ? AND state != ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(cache_key)
        .bind(JobState::Failed.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn pop_next(&self, now_millis: i64) -> Result<Option<Job>> {
        // Single statement: select + mark active cannot interleave with another worker
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, attempts = attempts + 1, run_at = NULL
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = ?
                   OR (state = ? AND (run_at IS NULL OR run_at <= ?))
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Active.as_str())
        .bind(now_millis)
        .bind(JobState::Waiting.as_str())
        .bind(JobState::Delayed.as_str())
        .bind(now_millis)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = job.result.as_ref().map(|v| v.to_string());

        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, result = ?, error = ?,
                attempts = ?, max_attempts = ?, run_at = ?,
                started_at = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.as_str())
        .bind(&result)
        .bind(&job.error)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.run_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if outcome.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state = ?")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    #[allow(dead_code)] // Denormalised from payload for ad-hoc queries
    kind: String,
    payload: String,
    cache_key: Option<String>,
    state: String,
    result: Option<String>,
    error: Option<String>,
    attempts: i32,
    max_attempts: i32,
    run_at: Option<i64>,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let payload: JobPayload = serde_json::from_str(&self.payload)?;
        let state: JobState = self.state.parse()?;
        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Job {
            id: self.id,
            payload,
            cache_key: self.cache_key,
            state,
            result,
            error: self.error,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            run_at: self.run_at,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}
