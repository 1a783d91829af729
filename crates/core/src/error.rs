// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::port::ObjectStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The worker no longer holds the lease on this job (expired and reclaimed).
    #[error("Lease lost: {0}")]
    LeaseLost(String),

    #[error("Unsupported parser: {0} parser not configured")]
    UnsupportedParser(String),

    #[error("document has no parseable content")]
    EmptyContent,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error means another worker now owns the job.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, AppError::LeaseLost(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in the infra-sqlite crate
// by converting to AppError::Database(String)
