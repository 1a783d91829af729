// Lease keeper: heartbeats a claimed job until processing ends

use crate::domain::Lease;
use crate::port::JobRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Background heartbeat for one lease. Stops on its own when the lease is
/// lost; otherwise runs until `stop` (or drop).
pub struct LeaseKeeper {
    handle: JoinHandle<()>,
}

impl LeaseKeeper {
    pub fn spawn(job_repo: Arc<dyn JobRepository>, lease: Lease, every: Duration) -> Self {
        let handle = tokio::spawn(async move {
            // The claim itself stamped heartbeat_at, so skip the immediate tick
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match job_repo.heartbeat(&lease).await {
                    Ok(()) => debug!(job_id = %lease.job_id, "Heartbeat"),
                    Err(e) if e.is_lease_lost() => {
                        warn!(
                            job_id = %lease.job_id,
                            worker_id = %lease.worker_id,
                            attempt = lease.attempt,
                            "Lease lost, stopping heartbeat"
                        );
                        break;
                    }
                    // Transient store errors: keep trying until the lease times out
                    Err(e) => warn!(job_id = %lease.job_id, error = %e, "Heartbeat failed"),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for LeaseKeeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
