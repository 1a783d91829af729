// Transaction port for atomic terminal transitions

use crate::domain::{DocumentSource, DocumentStatus, FailureOutcome, Lease, NewChunk, ParseStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Repository able to open a unit of work spanning jobs, chunks and document metadata
#[async_trait]
pub trait TransactionalJobRepository: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>>;
}

/// Operations available inside a transaction. Nothing is visible to other
/// connections until `commit`; dropping without commit rolls back.
#[async_trait]
pub trait JobRepositoryTransaction: Transaction {
    /// Refresh the lease heartbeat (fenced). Run it first to gate the other writes.
    async fn heartbeat(&mut self, lease: &Lease) -> Result<()>;

    /// Delete all chunks of the version and insert `chunks`. Returns rows inserted.
    async fn replace_chunks(&mut self, source: &DocumentSource, chunks: &[NewChunk])
        -> Result<u64>;

    async fn set_version_parse_status(
        &mut self,
        document_version_id: &str,
        status: ParseStatus,
    ) -> Result<()>;

    async fn set_document_status(&mut self, document_id: &str, status: DocumentStatus)
        -> Result<()>;

    /// Mark the leased job completed (fenced)
    async fn complete(&mut self, lease: &Lease) -> Result<()>;

    /// Record a failed attempt as retrying or dead-lettered (fenced)
    async fn fail(&mut self, lease: &Lease, outcome: FailureOutcome, error: &str) -> Result<()>;
}
