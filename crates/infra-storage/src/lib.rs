// Ingest Infrastructure - Storage Adapters
// Implements: ObjectStore

pub mod local_store;

pub use local_store::LocalObjectStore;
