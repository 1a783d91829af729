// Ingestion Service - producer side of the job queue

pub mod enqueue;
pub mod upload;

pub use enqueue::{EnqueueOutcome, EnqueueRequest};
pub use upload::{UploadReceipt, UploadRequest};

use crate::domain::{DocumentStatus, IngestAction, IngestionJob, JobStatus, JobStatusView};
use crate::error::{AppError, Result};
use crate::port::{DocumentRepository, IdProvider, JobRepository, ObjectStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Job counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: i64,
    pub processing: i64,
    pub retrying: i64,
    pub completed: i64,
    pub dead_letter: i64,
}

impl QueueStats {
    fn set(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Queued => self.queued = count,
            JobStatus::Processing => self.processing = count,
            JobStatus::Retrying => self.retrying = count,
            JobStatus::Completed => self.completed = count,
            JobStatus::DeadLetter => self.dead_letter = count,
        }
    }

    pub fn total(&self) -> i64 {
        self.queued + self.processing + self.retrying + self.completed + self.dead_letter
    }
}

pub struct IngestionService {
    job_repo: Arc<dyn JobRepository>,
    doc_repo: Arc<dyn DocumentRepository>,
    object_store: Arc<dyn ObjectStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    max_attempts: i32,
}

impl IngestionService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        doc_repo: Arc<dyn DocumentRepository>,
        object_store: Arc<dyn ObjectStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        max_attempts: i32,
    ) -> Self {
        Self {
            job_repo,
            doc_repo,
            object_store,
            id_provider,
            time_provider,
            max_attempts,
        }
    }

    /// Enqueue (or deduplicate) an ingestion job for an existing version
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<EnqueueOutcome> {
        enqueue::execute(
            self.job_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            self.max_attempts,
            req,
        )
        .await
    }

    /// Job status; a tenant mismatch is reported as not found
    pub async fn get_job(&self, job_id: &str, tenant_id: Option<&str>) -> Result<JobStatusView> {
        let job = self
            .job_repo
            .find_by_id(&job_id.to_string())
            .await?
            .filter(|job| tenant_id.map_or(true, |t| job.tenant_id == t))
            .ok_or_else(|| AppError::NotFound(format!("ingestion job {}", job_id)))?;
        Ok(job.into())
    }

    pub async fn upload(&self, req: UploadRequest) -> Result<UploadReceipt> {
        upload::execute(
            upload::UploadDeps {
                doc_repo: self.doc_repo.as_ref(),
                object_store: self.object_store.as_ref(),
                id_provider: self.id_provider.as_ref(),
                time_provider: self.time_provider.as_ref(),
            },
            self.max_attempts,
            req,
        )
        .await
    }

    /// Re-run ingestion of a document's current version
    pub async fn reindex(
        &self,
        tenant_id: &str,
        document_id: &str,
        idempotency_key: Option<String>,
    ) -> Result<EnqueueOutcome> {
        let document = self
            .doc_repo
            .find_document(tenant_id, document_id)
            .await?
            .filter(|doc| doc.status != DocumentStatus::Deleted)
            .ok_or_else(|| AppError::NotFound(format!("document {}", document_id)))?;

        let version = match self
            .doc_repo
            .find_version(&document.id, document.current_version)
            .await?
        {
            Some(v) => v,
            None => {
                warn!(
                    document_id = %document.id,
                    version = document.current_version,
                    "Current version row missing"
                );
                return Err(AppError::Conflict(format!(
                    "document {} has no version {}",
                    document.id, document.current_version
                )));
            }
        };

        self.enqueue(EnqueueRequest {
            tenant_id: document.tenant_id,
            workspace_id: document.workspace_id,
            kb_id: document.kb_id,
            document_id: document.id,
            document_version_id: version.id,
            action: IngestAction::Reindex.as_str().to_string(),
            idempotency_key,
        })
        .await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for status in JobStatus::ALL {
            stats.set(status, self.job_repo.count_by_status(status).await?);
        }
        Ok(stats)
    }

    /// Dead-lettered jobs, most recent first
    pub async fn dead_letters(&self, limit: i64) -> Result<Vec<IngestionJob>> {
        self.job_repo
            .list_by_status(JobStatus::DeadLetter, limit.max(1))
            .await
    }
}
