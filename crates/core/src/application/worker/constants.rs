// Worker constants (no magic values)
use std::time::Duration;

/// Sleep between polls when nothing is claimable
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Lease keeper heartbeat period
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// A lease with no heartbeat for this long may be reclaimed (5 minutes)
pub const DEFAULT_LEASE_TIMEOUT_MS: i64 = 5 * 60 * 1000;

/// Worker identity when none is configured
pub const DEFAULT_WORKER_ID: &str = "ingest-worker-1";

/// Stage progress markers
pub const PROGRESS_LOADING: i32 = 5;
pub const PROGRESS_CHUNKING: i32 = 45;
pub const PROGRESS_DONE: i32 = 100;

/// Error recorded when recovery dead-letters an abandoned final attempt
pub const LEASE_EXPIRED_ERROR: &str = "lease expired after final attempt";
