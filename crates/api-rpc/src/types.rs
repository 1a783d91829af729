//! RPC Request/Response Types
//!
//! Method parameters and results, one pair per method.

use ingest_core::domain::IngestionJob;
use serde::{Deserialize, Serialize};

/// ingest.enqueue.v1
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

fn default_action() -> String {
    "upload".to_string()
}

/// Result of ingest.enqueue.v1 and ingest.reindex.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: String,
    pub stage: String,
    pub attempt_count: i32,
    /// False when the request was answered from an existing job
    pub created: bool,
}

impl EnqueueResponse {
    pub fn from_job(job: &IngestionJob, created: bool) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status.to_string(),
            stage: job.stage.to_string(),
            attempt_count: job.attempt_count,
            created,
        }
    }
}

/// ingest.upload.v1
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub filename: String,
    /// File bytes, standard base64
    pub content_base64: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub document_version_id: String,
    pub version: i32,
    pub object_key: String,
    pub job_id: String,
    pub job_status: String,
}

/// ingest.reindex.v1
#[derive(Debug, Deserialize)]
pub struct ReindexRequest {
    pub tenant_id: String,
    pub document_id: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// ingest.job.v1; the result is the core `JobStatusView`
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// admin.stats.v1
#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub queued_jobs: i64,
    pub processing_jobs: i64,
    pub retrying_jobs: i64,
    pub completed_jobs: i64,
    pub dead_letter_jobs: i64,
    pub uptime_seconds: i64,
}

/// admin.dead_letters.v1
#[derive(Debug, Deserialize)]
pub struct DeadLettersRequest {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job_id: String,
    pub tenant_id: String,
    pub document_id: String,
    pub document_version_id: String,
    pub action: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub finished_at: Option<i64>,
}

impl From<IngestionJob> for DeadLetterEntry {
    fn from(job: IngestionJob) -> Self {
        Self {
            action: job.action.to_string(),
            job_id: job.id,
            tenant_id: job.tenant_id,
            document_id: job.document_id,
            document_version_id: job.document_version_id,
            attempt_count: job.attempt_count,
            max_attempts: job.max_attempts,
            error: job.error,
            finished_at: job.finished_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLettersResponse {
    pub jobs: Vec<DeadLetterEntry>,
}
