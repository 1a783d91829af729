// Ingestion Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Job status. Transitions: queued -> processing -> {completed | retrying | dead_letter},
/// retrying -> processing once `next_run_at` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Retrying,
    Completed,
    DeadLetter,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Retrying,
        JobStatus::Completed,
        JobStatus::DeadLetter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Retrying => "retrying",
            JobStatus::Completed => "completed",
            JobStatus::DeadLetter => "dead_letter",
        }
    }

    /// Terminal states are never left again by the queue itself.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::DeadLetter)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "retrying" => Ok(JobStatus::Retrying),
            "completed" => Ok(JobStatus::Completed),
            "dead_letter" => Ok(JobStatus::DeadLetter),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Progress marker within a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Loading,
    Chunking,
    Completed,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::Loading => "loading",
            JobStage::Chunking => "chunking",
            JobStage::Completed => "completed",
            JobStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStage {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(JobStage::Queued),
            "loading" => Ok(JobStage::Loading),
            "chunking" => Ok(JobStage::Chunking),
            "completed" => Ok(JobStage::Completed),
            "failed" => Ok(JobStage::Failed),
            other => Err(DomainError::UnknownStage(other.to_string())),
        }
    }
}

/// What triggered the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestAction {
    Upload,
    Reindex,
}

impl IngestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestAction::Upload => "upload",
            IngestAction::Reindex => "reindex",
        }
    }
}

impl std::fmt::Display for IngestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upload" => Ok(IngestAction::Upload),
            "reindex" => Ok(IngestAction::Reindex),
            other => Err(DomainError::UnknownAction(other.to_string())),
        }
    }
}

/// Ingestion Job Entity (one row of `ingestion_jobs`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    // Identity
    pub id: JobId,
    pub tenant_id: String,
    pub idempotency_key: String,

    // Targeting (immutable once created)
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
    pub action: IngestAction,

    // Lifecycle
    pub status: JobStatus,
    pub stage: JobStage,
    pub progress: i32,

    // Lease
    pub locked_at: Option<i64>,
    pub locked_by: Option<String>,
    pub heartbeat_at: Option<i64>,

    // Retry bookkeeping
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_run_at: i64,

    // Timestamps (epoch ms)
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Targeting fields of a new job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
}

impl IngestionJob {
    /// Create a freshly queued job
    ///
    /// `id` and `now_millis` are injected (IdProvider / TimeProvider), never generated here.
    /// The job is claimable immediately: `next_run_at == created_at`.
    pub fn new_queued(
        id: impl Into<String>,
        now_millis: i64,
        target: JobTarget,
        action: IngestAction,
        idempotency_key: impl Into<String>,
        max_attempts: i32,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: target.tenant_id,
            idempotency_key: idempotency_key.into(),
            workspace_id: target.workspace_id,
            kb_id: target.kb_id,
            document_id: target.document_id,
            document_version_id: target.document_version_id,
            action,
            status: JobStatus::Queued,
            stage: JobStage::Queued,
            progress: 0,
            locked_at: None,
            locked_by: None,
            heartbeat_at: None,
            attempt_count: 0,
            max_attempts,
            next_run_at: now_millis,
            started_at: None,
            finished_at: None,
            error: None,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Row returned by a successful claim: targeting fields plus attempt counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub id: JobId,
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
}

impl ClaimedJob {
    pub fn lease(&self, worker_id: impl Into<String>) -> Lease {
        Lease {
            job_id: self.id.clone(),
            worker_id: worker_id.into(),
            attempt: self.attempt_count,
        }
    }
}

/// Ownership token of a claimed job.
///
/// Every write after the claim is conditioned on `locked_by = worker_id AND
/// attempt_count = attempt`; a reclaim by another worker bumps `attempt_count`,
/// so a stale holder can no longer match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub job_id: JobId,
    pub worker_id: String,
    pub attempt: i32,
}

/// How a failed attempt is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to the claimable pool once `next_run_at` (epoch ms) elapses
    Retry { next_run_at: i64 },
    /// Attempts exhausted; terminal until an operator intervenes
    DeadLetter,
}

impl FailureOutcome {
    pub fn is_retry(&self) -> bool {
        matches!(self, FailureOutcome::Retry { .. })
    }
}

/// Read model returned by the job status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub workspace_id: String,
    pub document_id: String,
    pub document_version_id: String,
    pub status: JobStatus,
    pub stage: JobStage,
    pub progress: i32,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_run_at: i64,
    pub locked_at: Option<i64>,
    pub locked_by: Option<String>,
    pub heartbeat_at: Option<i64>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub error: Option<String>,
    pub terminal: bool,
}

impl From<IngestionJob> for JobStatusView {
    fn from(job: IngestionJob) -> Self {
        let terminal = job.is_terminal();
        Self {
            job_id: job.id,
            workspace_id: job.workspace_id,
            document_id: job.document_id,
            document_version_id: job.document_version_id,
            status: job.status,
            stage: job.stage,
            progress: job.progress,
            attempt_count: job.attempt_count,
            max_attempts: job.max_attempts,
            next_run_at: job.next_run_at,
            locked_at: job.locked_at,
            locked_by: job.locked_by,
            heartbeat_at: job.heartbeat_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            error: job.error,
            terminal,
        }
    }
}
