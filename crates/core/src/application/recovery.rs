// Recovery of abandoned final attempts
use crate::application::worker::constants::LEASE_EXPIRED_ERROR;
use crate::application::worker::record_failure;
use crate::domain::{FailureOutcome, Lease};
use crate::error::Result;
use crate::port::{JobRepository, TransactionalJobRepository};
use std::sync::Arc;
use tracing::{info, warn};

/// Dead-letters jobs whose worker vanished during their last allowed attempt.
///
/// Stale leases with attempts left need no help: the claim predicate picks
/// them up again. Exhausted ones are never claimable, so without this sweep
/// they would sit in `processing` forever.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    tx_repo: Arc<dyn TransactionalJobRepository>,
    lease_timeout_ms: i64,
}

impl RecoveryService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        tx_repo: Arc<dyn TransactionalJobRepository>,
        lease_timeout_ms: i64,
    ) -> Self {
        Self {
            job_repo,
            tx_repo,
            lease_timeout_ms,
        }
    }

    /// Returns the number of jobs moved to dead letter
    pub async fn dead_letter_expired_leases(&self) -> Result<usize> {
        let expired = self
            .job_repo
            .find_expired_leases(self.lease_timeout_ms)
            .await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let mut recovered = 0;
        for job in expired {
            // Fence on the dead worker's lease so a late heartbeat or finish wins the race
            let Some(worker_id) = job.locked_by.clone() else {
                continue;
            };
            let lease = Lease {
                job_id: job.id.clone(),
                worker_id,
                attempt: job.attempt_count,
            };

            match record_failure(
                self.tx_repo.as_ref(),
                &lease,
                &job.document_id,
                &job.document_version_id,
                FailureOutcome::DeadLetter,
                LEASE_EXPIRED_ERROR,
            )
            .await
            {
                Ok(()) => {
                    warn!(
                        job_id = %job.id,
                        worker_id = %lease.worker_id,
                        attempt = job.attempt_count,
                        "Abandoned final attempt dead-lettered"
                    );
                    recovered += 1;
                }
                Err(e) if e.is_lease_lost() => {
                    info!(job_id = %job.id, "Job changed during recovery, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        info!(recovered, "Expired lease recovery complete");
        Ok(recovered)
    }
}
