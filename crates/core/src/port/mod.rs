// Port Layer - Interfaces for external dependencies

pub mod document_repository;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod object_store;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use document_repository::DocumentRepository;
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use object_store::{ObjectStore, ObjectStoreError};
pub use time_provider::TimeProvider;
pub use transaction::{JobRepositoryTransaction, Transaction, TransactionalJobRepository};
