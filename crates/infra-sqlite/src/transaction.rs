// SQLite Transaction Implementation

use crate::error::{lease_lost, map_sqlx_error};
use async_trait::async_trait;
use ingest_core::application::worker::constants::PROGRESS_DONE;
use ingest_core::domain::{
    DocumentSource, DocumentStatus, FailureOutcome, Lease, NewChunk, ParseStatus,
};
use ingest_core::error::Result;
use ingest_core::port::{JobRepositoryTransaction, TimeProvider, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};
use std::sync::Arc;

pub struct SqliteJobTransaction<'a> {
    tx: SqlxTransaction<'a, Sqlite>,
    time_provider: Arc<dyn TimeProvider>,
}

impl<'a> SqliteJobTransaction<'a> {
    pub fn new(tx: SqlxTransaction<'a, Sqlite>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { tx, time_provider }
    }
}

#[async_trait]
impl Transaction for SqliteJobTransaction<'_> {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobRepositoryTransaction for SqliteJobTransaction<'_> {
    async fn heartbeat(&mut self, lease: &Lease) -> Result<()> {
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
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(lease_lost(lease));
        }
        Ok(())
    }

    async fn replace_chunks(
        &mut self,
        source: &DocumentSource,
        chunks: &[NewChunk],
    ) -> Result<u64> {
        let now = self.time_provider.now_millis();

        sqlx::query("DELETE FROM document_chunks WHERE document_version_id = ?")
            .bind(&source.document_version_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        let mut inserted = 0;
        for chunk in chunks {
            let result = sqlx::query(
                r#"
                INSERT INTO document_chunks (
                    id, tenant_id, workspace_id, kb_id, document_id, document_version_id,
                    chunk_no, content, token_count, metadata, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, '{}', ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&source.tenant_id)
            .bind(&source.workspace_id)
            .bind(&source.kb_id)
            .bind(&source.document_id)
            .bind(&source.document_version_id)
            .bind(chunk.chunk_no)
            .bind(&chunk.content)
            .bind(chunk.token_count)
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn set_version_parse_status(
        &mut self,
        document_version_id: &str,
        status: ParseStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE document_versions SET parse_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(document_version_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn set_document_status(
        &mut self,
        document_id: &str,
        status: DocumentStatus,
    ) -> Result<()> {
        // A deleted document stays deleted
        sqlx::query(
            "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND status <> 'deleted'",
        )
        .bind(status.as_str())
        .bind(self.time_provider.now_millis())
        .bind(document_id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn complete(&mut self, lease: &Lease) -> Result<()> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'completed', stage = 'completed', progress = ?,
                finished_at = ?, heartbeat_at = ?, updated_at = ?,
                locked_at = NULL, locked_by = NULL, error = NULL
            WHERE id = ? AND status = 'processing' AND locked_by = ? AND attempt_count = ?
            "#,
        )
        .bind(PROGRESS_DONE)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(&lease.job_id)
        .bind(&lease.worker_id)
        .bind(lease.attempt)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(lease_lost(lease));
        }
        Ok(())
    }

    async fn fail(&mut self, lease: &Lease, outcome: FailureOutcome, error: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        let query = match outcome {
            FailureOutcome::Retry { next_run_at } => sqlx::query(
                r#"
                UPDATE ingestion_jobs
                SET status = 'retrying', stage = 'failed', progress = 0,
                    next_run_at = ?, heartbeat_at = ?, updated_at = ?,
                    locked_at = NULL, locked_by = NULL, error = ?
                WHERE id = ? AND status = 'processing' AND locked_by = ? AND attempt_count = ?
                "#,
            )
            .bind(next_run_at),
            FailureOutcome::DeadLetter => sqlx::query(
                r#"
                UPDATE ingestion_jobs
                SET status = 'dead_letter', stage = 'failed', progress = 0,
                    finished_at = ?, heartbeat_at = ?, updated_at = ?,
                    locked_at = NULL, locked_by = NULL, error = ?
                WHERE id = ? AND status = 'processing' AND locked_by = ? AND attempt_count = ?
                "#,
            )
            .bind(now),
        };

        let result = query
            .bind(now)
            .bind(now)
            .bind(error)
            .bind(&lease.job_id)
            .bind(&lease.worker_id)
            .bind(lease.attempt)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(lease_lost(lease));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{fixture, queued_job, seed_version, Fixture, T0};
    use ingest_core::domain::{
        DocumentStatus, FailureOutcome, JobStage, JobStatus, Lease, NewChunk, ParseStatus,
    };
    use ingest_core::port::{
        DocumentRepository, JobRepository, JobRepositoryTransaction, Transaction,
        TransactionalJobRepository,
    };

    async fn claimed(fx: &Fixture) -> Lease {
        seed_version(&fx.docs, "d1", "v1").await;
        fx.jobs
            .insert_if_absent(&queued_job("job-1", "d1", "v1", T0, 2))
            .await
            .unwrap();
        fx.jobs
            .claim_next("w-1", 300_000)
            .await
            .unwrap()
            .unwrap()
            .lease("w-1")
    }

    fn chunks(texts: &[&str]) -> Vec<NewChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| NewChunk {
                id: format!("c-{}-{}", t, i),
                chunk_no: i as i32 + 1,
                content: t.to_string(),
                token_count: 1,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_complete_with_chunks_commits_together() {
        let fx = fixture().await;
        let lease = claimed(&fx).await;
        let source = fx.docs.resolve_source("v1").await.unwrap().unwrap();

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        assert_eq!(
            tx.replace_chunks(&source, &chunks(&["a", "b"])).await.unwrap(),
            2
        );
        tx.set_version_parse_status("v1", ParseStatus::Success)
            .await
            .unwrap();
        tx.set_document_status("d1", DocumentStatus::Ready)
            .await
            .unwrap();
        tx.complete(&lease).await.unwrap();
        tx.commit().await.unwrap();

        let job = fx.jobs.find_by_id(&lease.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.stage, JobStage::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.finished_at.is_some());
        assert!(job.locked_by.is_none() && job.locked_at.is_none());

        let doc = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert_eq!(fx.docs.list_chunks("v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_chunks_drops_previous_rows() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;
        let source = fx.docs.resolve_source("v1").await.unwrap().unwrap();

        for batch in [&["a", "b", "c"][..], &["z"][..]] {
            let mut tx = fx.jobs.begin_transaction().await.unwrap();
            tx.replace_chunks(&source, &chunks(batch)).await.unwrap();
            tx.commit().await.unwrap();
        }

        let stored = fx.docs.list_chunks("v1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "z");
        assert_eq!(stored[0].metadata, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let fx = fixture().await;
        let lease = claimed(&fx).await;
        let source = fx.docs.resolve_source("v1").await.unwrap().unwrap();

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        tx.replace_chunks(&source, &chunks(&["a"])).await.unwrap();
        tx.complete(&lease).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(fx.docs.list_chunks("v1").await.unwrap().is_empty());
        let job = fx.jobs.find_by_id(&lease.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_fail_retry_then_dead_letter() {
        let fx = fixture().await;
        let lease = claimed(&fx).await;

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        tx.fail(
            &lease,
            FailureOutcome::Retry {
                next_run_at: T0 + 15_000,
            },
            "object missing",
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let job = fx.jobs.find_by_id(&lease.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Retrying);
        assert_eq!(job.stage, JobStage::Failed);
        assert_eq!(job.progress, 0);
        assert_eq!(job.next_run_at, T0 + 15_000);
        assert_eq!(job.error.as_deref(), Some("object missing"));
        assert!(job.finished_at.is_none() && job.locked_by.is_none());

        fx.clock.advance_secs(15);
        let lease = fx
            .jobs
            .claim_next("w-1", 300_000)
            .await
            .unwrap()
            .unwrap()
            .lease("w-1");
        assert_eq!(lease.attempt, 2);

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        tx.fail(&lease, FailureOutcome::DeadLetter, "still missing")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let job = fx.jobs.find_by_id(&lease.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert!(job.finished_at.is_some());
        assert!(job.is_terminal());
    }

    #[tokio::test]
    async fn test_complete_with_foreign_lease_is_lease_lost() {
        let fx = fixture().await;
        let lease = claimed(&fx).await;
        let foreign = Lease {
            worker_id: "w-9".into(),
            ..lease
        };

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        let err = tx.complete(&foreign).await.unwrap_err();
        assert!(err.is_lease_lost());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_gates_document_write() {
        let fx = fixture().await;
        let lease = claimed(&fx).await;
        fx.clock.advance_secs(10);

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        tx.heartbeat(&lease).await.unwrap();
        tx.set_document_status("d1", DocumentStatus::Processing)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let job = fx.jobs.find_by_id(&lease.job_id).await.unwrap().unwrap();
        assert_eq!(job.heartbeat_at, Some(T0 + 10_000));

        let stale = Lease {
            attempt: lease.attempt + 1,
            ..lease
        };
        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        assert!(tx.heartbeat(&stale).await.unwrap_err().is_lease_lost());
        tx.rollback().await.unwrap();
    }
}
