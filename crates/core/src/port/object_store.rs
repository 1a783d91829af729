// Object Store Port

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage keyed by relative, `/`-separated object keys
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;

    /// Fails with `NotFound` when nothing is stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Map-backed store
    #[derive(Default)]
    pub struct InMemoryObjectStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl InMemoryObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().remove(key)
        }

        pub fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryObjectStore {
        async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
            if key.is_empty() {
                return Err(ObjectStoreError::InvalidKey(key.to_string()));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
        }

        async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
            Ok(self.objects.lock().unwrap().contains_key(key))
        }
    }
}
