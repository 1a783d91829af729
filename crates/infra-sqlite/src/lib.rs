// Ingest Infrastructure - SQLite Adapter
// Implements: JobRepository, TransactionalJobRepository, DocumentRepository

mod connection;
mod document_repository;
mod error;
mod job_repository;
mod migration;
mod transaction;

pub use connection::create_pool;
pub use document_repository::SqliteDocumentRepository;
pub use job_repository::SqliteJobRepository;
pub use migration::run_migrations;
pub use transaction::SqliteJobTransaction;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

#[cfg(test)]
mod test_support;
