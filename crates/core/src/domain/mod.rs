// Domain Layer - Pure business logic and entities

pub mod document;
pub mod error;
pub mod idempotency;
pub mod job;

// Re-exports
pub use document::{
    Document, DocumentChunk, DocumentSource, DocumentStatus, DocumentVersion, NewChunk,
    ParseStatus, ParserType,
};
pub use error::DomainError;
pub use idempotency::build_idempotency_key;
pub use job::{
    ClaimedJob, FailureOutcome, IngestAction, IngestionJob, JobId, JobStage, JobStatus,
    JobStatusView, JobTarget, Lease,
};
