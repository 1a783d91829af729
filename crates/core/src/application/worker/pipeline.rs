// Ingestion pipeline: object -> text -> chunks, finalized in one transaction

use super::constants::PROGRESS_CHUNKING;
use crate::application::chunker::{token_count, ChunkConfig};
use crate::domain::{
    ClaimedJob, DocumentSource, DocumentStatus, FailureOutcome, JobStage, Lease, NewChunk,
    ParseStatus,
};
use crate::error::{AppError, Result};
use crate::port::{
    DocumentRepository, IdProvider, JobRepository, JobRepositoryTransaction, ObjectStore,
    Transaction, TransactionalJobRepository,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything one attempt needs, cheap to clone into a spawned task
#[derive(Clone)]
pub struct IngestionPipeline {
    job_repo: Arc<dyn JobRepository>,
    tx_repo: Arc<dyn TransactionalJobRepository>,
    doc_repo: Arc<dyn DocumentRepository>,
    object_store: Arc<dyn ObjectStore>,
    id_provider: Arc<dyn IdProvider>,
    chunking: ChunkConfig,
}

impl IngestionPipeline {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        tx_repo: Arc<dyn TransactionalJobRepository>,
        doc_repo: Arc<dyn DocumentRepository>,
        object_store: Arc<dyn ObjectStore>,
        id_provider: Arc<dyn IdProvider>,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            job_repo,
            tx_repo,
            doc_repo,
            object_store,
            id_provider,
            chunking,
        }
    }

    /// Run one attempt of a claimed job. Returns the number of chunks written.
    ///
    /// Any error leaves the job `processing`; the caller records the failure.
    pub async fn process(&self, job: &ClaimedJob, lease: &Lease) -> Result<usize> {
        let source = self
            .doc_repo
            .resolve_source(&job.document_version_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("document version {}", job.document_version_id))
            })?;
        let object_key = source
            .object_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "document version {} has no object key",
                    job.document_version_id
                ))
            })?;

        self.mark_processing(&source.document_id, lease).await?;

        // Loading
        let bytes = self.object_store.get(&object_key).await?;
        let parser = source.parser();
        let text = parser
            .decode(&bytes)
            .ok_or_else(|| AppError::UnsupportedParser(parser.to_string()))?;
        debug!(job_id = %job.id, parser = %parser, bytes = bytes.len(), "Object loaded");

        // Chunking
        self.job_repo
            .advance_stage(lease, JobStage::Chunking, PROGRESS_CHUNKING)
            .await?;
        let pieces = self.chunking.chunk(&text);
        if pieces.is_empty() {
            return Err(AppError::EmptyContent);
        }
        let chunks: Vec<NewChunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| NewChunk {
                id: self.id_provider.generate_id(),
                chunk_no: i as i32 + 1,
                token_count: token_count(&content),
                content,
            })
            .collect();

        let mut tx = self.tx_repo.begin_transaction().await?;
        match finalize(tx.as_mut(), &source, &chunks, lease).await {
            Ok(written) => {
                tx.commit().await?;
                info!(
                    job_id = %job.id,
                    document_version_id = %source.document_version_id,
                    chunks = written,
                    "Document version indexed"
                );
                Ok(chunks.len())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Flip the document to `processing` only while the lease is still ours
    async fn mark_processing(&self, document_id: &str, lease: &Lease) -> Result<()> {
        let mut tx = self.tx_repo.begin_transaction().await?;
        let applied = async {
            tx.heartbeat(lease).await?;
            tx.set_document_status(document_id, DocumentStatus::Processing)
                .await
        }
        .await;

        match applied {
            Ok(()) => tx.commit().await,
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

async fn finalize(
    tx: &mut dyn JobRepositoryTransaction,
    source: &DocumentSource,
    chunks: &[NewChunk],
    lease: &Lease,
) -> Result<u64> {
    // Chunk rows go first so the transaction takes the write lock up front
    let written = tx.replace_chunks(source, chunks).await?;
    tx.set_version_parse_status(&source.document_version_id, ParseStatus::Success)
        .await?;
    tx.set_document_status(&source.document_id, DocumentStatus::Ready)
        .await?;
    tx.complete(lease).await?;
    Ok(written)
}

/// Record a failed attempt together with the matching document/version status.
///
/// Retrying leaves both `pending`; a dead letter marks both `failed`.
pub async fn record_failure(
    tx_repo: &dyn TransactionalJobRepository,
    lease: &Lease,
    document_id: &str,
    document_version_id: &str,
    outcome: FailureOutcome,
    error: &str,
) -> Result<()> {
    let (parse_status, document_status) = match outcome {
        FailureOutcome::Retry { .. } => (ParseStatus::Pending, DocumentStatus::Pending),
        FailureOutcome::DeadLetter => (ParseStatus::Failed, DocumentStatus::Failed),
    };

    let mut tx = tx_repo.begin_transaction().await?;
    let applied = async {
        // Job row first: a lost lease aborts before anything else is touched
        tx.fail(lease, outcome, error).await?;
        tx.set_version_parse_status(document_version_id, parse_status)
            .await?;
        tx.set_document_status(document_id, document_status).await
    }
    .await;

    match applied {
        Ok(()) => tx.commit().await,
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}
