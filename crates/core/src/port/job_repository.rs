// Job Repository Port (Interface)

use crate::domain::{ClaimedJob, IngestionJob, JobId, JobStage, JobStatus, Lease};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for ingestion job persistence
///
/// Every method is a single atomic statement. Lease-fenced methods return
/// `AppError::LeaseLost` when the lease no longer matches the row.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a job unless `(tenant_id, idempotency_key)` already exists.
    /// Returns the stored row and whether this call created it.
    async fn insert_if_absent(&self, job: &IngestionJob) -> Result<(IngestionJob, bool)>;

    async fn find_by_id(&self, id: &JobId) -> Result<Option<IngestionJob>>;

    async fn find_by_idempotency_key(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<IngestionJob>>;

    /// Atomically claim the oldest claimable job for `worker_id`.
    ///
    /// Claimable: queued/retrying and due, or processing with a lease older
    /// than `lease_timeout_ms`; in both cases only while attempts remain.
    async fn claim_next(&self, worker_id: &str, lease_timeout_ms: i64)
        -> Result<Option<ClaimedJob>>;

    /// Refresh `heartbeat_at` (fenced)
    async fn heartbeat(&self, lease: &Lease) -> Result<()>;

    /// Move to a new stage and progress, refreshing the heartbeat (fenced)
    async fn advance_stage(&self, lease: &Lease, stage: JobStage, progress: i32) -> Result<()>;

    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Jobs in `status`, most recently updated first
    async fn list_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<IngestionJob>>;

    /// Processing jobs whose lease expired and whose attempts are exhausted
    async fn find_expired_leases(&self, lease_timeout_ms: i64) -> Result<Vec<IngestionJob>>;
}
