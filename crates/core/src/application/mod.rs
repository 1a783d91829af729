// Application Layer - Use Cases and Business Logic

pub mod chunker;
pub mod ingestion;
pub mod recovery;
pub mod retry;
pub mod worker;

// Re-exports
pub use chunker::{chunk_text, ChunkConfig};
pub use ingestion::IngestionService;
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use worker::{
    shutdown_channel, IngestionPipeline, JobOutcome, ShutdownSender, ShutdownToken, Worker,
    WorkerConfig,
};
