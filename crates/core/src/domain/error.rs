// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Unknown job stage: {0}")]
    UnknownStage(String),

    #[error("Unknown ingestion action: {0} (expected upload or reindex)")]
    UnknownAction(String),

    #[error("Unknown document status: {0}")]
    UnknownDocumentStatus(String),

    #[error("Invalid chunk config: chunk_size={chunk_size}, overlap={overlap}")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },

    #[error("Progress out of range: {0}")]
    InvalidProgress(i32),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
