// Worker - claim / process / finalize loop

pub mod constants;
pub mod heartbeat;
pub mod pipeline;
mod shutdown;

use constants::*;
pub use heartbeat::LeaseKeeper;
pub use pipeline::{record_failure, IngestionPipeline};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{truncate_error, RetryDecision, RetryPolicy};
use crate::domain::{ClaimedJob, FailureOutcome, Lease};
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider, TransactionalJobRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub lease_timeout_ms: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: DEFAULT_WORKER_ID.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            lease_timeout_ms: DEFAULT_LEASE_TIMEOUT_MS,
        }
    }
}

/// How a single claimed job ended, from the worker's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { chunks: usize },
    Retrying { next_run_at: i64 },
    DeadLettered,
    /// Another worker owns the job now; nothing was written
    LeaseLost,
}

/// Worker competes with its peers for claimable ingestion jobs
pub struct Worker {
    config: WorkerConfig,
    job_repo: Arc<dyn JobRepository>,
    tx_repo: Arc<dyn TransactionalJobRepository>,
    pipeline: IngestionPipeline,
    retry_policy: RetryPolicy,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        job_repo: Arc<dyn JobRepository>,
        tx_repo: Arc<dyn TransactionalJobRepository>,
        pipeline: IngestionPipeline,
        retry_policy: RetryPolicy,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            job_repo,
            tx_repo,
            pipeline,
            retry_policy,
            time_provider,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = %self.config.worker_id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.process_next_job().await {
                // Drain without sleeping while work is available
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    error!(worker_id = %self.config.worker_id, error = %e, "Worker poll failed");
                }
            }
            tokio::select! {
                _ = sleep(self.config.poll_interval) => {},
                _ = shutdown.wait() => {
                    info!(worker_id = %self.config.worker_id, "Worker interrupted while idle");
                    break;
                }
            }
        }
        info!(worker_id = %self.config.worker_id, "Worker stopped");
        Ok(())
    }

    /// Claim and process at most one job. `Ok(None)` when nothing was claimable.
    pub async fn process_next_job(&self) -> Result<Option<JobOutcome>> {
        let job = match self
            .job_repo
            .claim_next(&self.config.worker_id, self.config.lease_timeout_ms)
            .await?
        {
            Some(j) => j,
            None => return Ok(None),
        };
        let lease = job.lease(self.config.worker_id.clone());
        info!(
            job_id = %job.id,
            worker_id = %lease.worker_id,
            attempt = job.attempt_count,
            max_attempts = job.max_attempts,
            "Job claimed"
        );

        let keeper = LeaseKeeper::spawn(
            Arc::clone(&self.job_repo),
            lease.clone(),
            self.config.heartbeat_interval,
        );

        // Spawned so a panic in the pipeline surfaces as a JoinError
        let pipeline = self.pipeline.clone();
        let (task_job, task_lease) = (job.clone(), lease.clone());
        let handle =
            tokio::task::spawn(async move { pipeline.process(&task_job, &task_lease).await });
        let execution = handle.await;
        keeper.stop();

        let message = match execution {
            Ok(Ok(chunks)) => {
                info!(job_id = %job.id, chunks, "Job completed");
                return Ok(Some(JobOutcome::Completed { chunks }));
            }
            Ok(Err(e)) if e.is_lease_lost() => {
                warn!(job_id = %job.id, worker_id = %lease.worker_id, "Lease lost, dropping job");
                return Ok(Some(JobOutcome::LeaseLost));
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_err) if join_err.is_panic() => {
                let panic = join_err.into_panic();
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!(job_id = %job.id, panic_msg = %msg, "Job panicked");
                format!("worker panicked: {}", msg)
            }
            Err(join_err) => format!("job task cancelled: {}", join_err),
        };

        self.fail_job(&job, &lease, &message).await.map(Some)
    }

    async fn fail_job(&self, job: &ClaimedJob, lease: &Lease, message: &str) -> Result<JobOutcome> {
        let (outcome, result) =
            match self
                .retry_policy
                .decide(&job.id, job.attempt_count, job.max_attempts)
            {
                RetryDecision::Retry { delay_ms } => {
                    let next_run_at = self.time_provider.now_millis() + delay_ms;
                    (
                        FailureOutcome::Retry { next_run_at },
                        JobOutcome::Retrying { next_run_at },
                    )
                }
                RetryDecision::DeadLetter => (FailureOutcome::DeadLetter, JobOutcome::DeadLettered),
            };

        let error = truncate_error(message);
        match record_failure(
            self.tx_repo.as_ref(),
            lease,
            &job.document_id,
            &job.document_version_id,
            outcome,
            &error,
        )
        .await
        {
            Ok(()) => {
                warn!(
                    job_id = %job.id,
                    attempt = job.attempt_count,
                    retry = outcome.is_retry(),
                    error = %error,
                    "Job attempt failed"
                );
                Ok(result)
            }
            Err(e) if e.is_lease_lost() => {
                warn!(job_id = %job.id, "Lease lost before failure could be recorded");
                Ok(JobOutcome::LeaseLost)
            }
            Err(e) => Err(e),
        }
    }
}
