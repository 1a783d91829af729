// SQLite JobRepository Implementation

use crate::error::{lease_lost, map_sqlx_error};
use crate::SqliteJobTransaction;
use async_trait::async_trait;
use ingest_core::application::worker::constants::PROGRESS_LOADING;
use ingest_core::domain::{
    ClaimedJob, DomainError, IngestionJob, JobId, JobStage, JobStatus, Lease,
};
use ingest_core::error::Result;
use ingest_core::port::{
    JobRepository, JobRepositoryTransaction, TimeProvider, TransactionalJobRepository,
};
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::debug;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_by_key(&self, tenant_id: &str, key: &str) -> Result<Option<IngestionJob>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM ingestion_jobs WHERE tenant_id = ? AND idempotency_key = ?",
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }
}

/// Insert `job` unless its `(tenant_id, idempotency_key)` already exists.
/// Returns whether a row was written.
pub(crate) async fn insert_job<'e, E>(executor: E, job: &IngestionJob) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO ingestion_jobs (
            id, tenant_id, workspace_id, kb_id, document_id, document_version_id,
            idempotency_key, action, status, stage, progress,
            locked_at, locked_by, heartbeat_at,
            attempt_count, max_attempts, next_run_at,
            started_at, finished_at, error, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (tenant_id, idempotency_key) DO NOTHING
        "#,
    )
    .bind(&job.id)
    .bind(&job.tenant_id)
    .bind(&job.workspace_id)
    .bind(&job.kb_id)
    .bind(&job.document_id)
    .bind(&job.document_version_id)
    .bind(&job.idempotency_key)
    .bind(job.action.as_str())
    .bind(job.status.as_str())
    .bind(job.stage.as_str())
    .bind(job.progress)
    .bind(job.locked_at)
    .bind(&job.locked_by)
    .bind(job.heartbeat_at)
    .bind(job.attempt_count)
    .bind(job.max_attempts)
    .bind(job.next_run_at)
    .bind(job.started_at)
    .bind(job.finished_at)
    .bind(&job.error)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(executor)
    .await
    .map_err(map_sqlx_error)?;

    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert_if_absent(&self, job: &IngestionJob) -> Result<(IngestionJob, bool)> {
        let created = insert_job(&self.pool, job).await?;
        let stored = self
            .find_by_key(&job.tenant_id, &job.idempotency_key)
            .await?
            .ok_or_else(|| {
                ingest_core::AppError::Internal(format!(
                    "job with key {} vanished after insert",
                    job.idempotency_key
                ))
            })?;
        Ok((stored, created))
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<IngestionJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM ingestion_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<IngestionJob>> {
        self.find_by_key(tenant_id, idempotency_key).await
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lease_timeout_ms: i64,
    ) -> Result<Option<ClaimedJob>> {
        let now = self.time_provider.now_millis();
        let stale_before = now - lease_timeout_ms;

        // Select and mark in one statement: SQLite takes the write lock before
        // evaluating the subquery, so concurrent claimers serialize and a loser
        // sees the row already processing.
        let row = sqlx::query_as::<_, ClaimedRow>(
            r#"
            UPDATE ingestion_jobs
            SET status = 'processing', stage = 'loading', progress = ?,
                locked_at = ?, locked_by = ?, heartbeat_at = ?,
                started_at = COALESCE(started_at, ?),
                attempt_count = attempt_count + 1,
                error = NULL, updated_at = ?
            WHERE id = (
                SELECT id FROM ingestion_jobs
                WHERE attempt_count < max_attempts
                  AND (
                    (status IN ('queued', 'retrying')
                        AND next_run_at <= ?
                        AND (locked_at IS NULL OR locked_at < ?))
                    OR (status = 'processing'
                        AND COALESCE(heartbeat_at, locked_at) < ?)
                  )
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING id, tenant_id, workspace_id, kb_id, document_id, document_version_id,
                      attempt_count, max_attempts
            "#,
        )
        .bind(PROGRESS_LOADING)
        .bind(now)
        .bind(worker_id)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(stale_before)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(r) = &row {
            debug!(job_id = %r.id, worker_id, attempt = r.attempt_count, "Claimed");
        }
        Ok(row.map(ClaimedRow::into_claimed))
    }

    async fn heartbeat(&self, lease: &Lease) -> Result<()> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET heartbeat_at = ?, updated_at = ?
            WHERE id = ? AND status = 'processing' AND locked_by = ? AND attempt_count = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(&lease.job_id)
        .bind(&lease.worker_id)
        .bind(lease.attempt)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(lease_lost(lease));
        }
        Ok(())
    }

    async fn advance_stage(&self, lease: &Lease, stage: JobStage, progress: i32) -> Result<()> {
        if !(0..=100).contains(&progress) {
            return Err(DomainError::InvalidProgress(progress).into());
        }

        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET stage = ?, progress = ?, heartbeat_at = ?, updated_at = ?
            WHERE id = ? AND status = 'processing' AND locked_by = ? AND attempt_count = ?
            "#,
        )
        .bind(stage.as_str())
        .bind(progress)
        .bind(now)
        .bind(now)
        .bind(&lease.job_id)
        .bind(&lease.worker_id)
        .bind(lease.attempt)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(lease_lost(lease));
        }
        Ok(())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingestion_jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn list_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<IngestionJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM ingestion_jobs
            WHERE status = ?
            ORDER BY updated_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn find_expired_leases(&self, lease_timeout_ms: i64) -> Result<Vec<IngestionJob>> {
        let stale_before = self.time_provider.now_millis() - lease_timeout_ms;
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM ingestion_jobs
            WHERE status = 'processing'
              AND attempt_count >= max_attempts
              AND COALESCE(heartbeat_at, locked_at) < ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[async_trait]
impl TransactionalJobRepository for SqliteJobRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteJobTransaction::new(
            tx,
            Arc::clone(&self.time_provider),
        )))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    tenant_id: String,
    workspace_id: String,
    kb_id: String,
    document_id: String,
    document_version_id: String,
    idempotency_key: String,
    action: String,
    status: String,
    stage: String,
    progress: i32,
    locked_at: Option<i64>,
    locked_by: Option<String>,
    heartbeat_at: Option<i64>,
    attempt_count: i32,
    max_attempts: i32,
    next_run_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<IngestionJob> {
        Ok(IngestionJob {
            id: self.id,
            tenant_id: self.tenant_id,
            idempotency_key: self.idempotency_key,
            workspace_id: self.workspace_id,
            kb_id: self.kb_id,
            document_id: self.document_id,
            document_version_id: self.document_version_id,
            action: self.action.parse()?,
            status: self.status.parse()?,
            stage: self.stage.parse()?,
            progress: self.progress,
            locked_at: self.locked_at,
            locked_by: self.locked_by,
            heartbeat_at: self.heartbeat_at,
            attempt_count: self.attempt_count,
            max_attempts: self.max_attempts,
            next_run_at: self.next_run_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimedRow {
    id: String,
    tenant_id: String,
    workspace_id: String,
    kb_id: String,
    document_id: String,
    document_version_id: String,
    attempt_count: i32,
    max_attempts: i32,
}

impl ClaimedRow {
    fn into_claimed(self) -> ClaimedJob {
        ClaimedJob {
            id: self.id,
            tenant_id: self.tenant_id,
            workspace_id: self.workspace_id,
            kb_id: self.kb_id,
            document_id: self.document_id,
            document_version_id: self.document_version_id,
            attempt_count: self.attempt_count,
            max_attempts: self.max_attempts,
        }
    }
}
