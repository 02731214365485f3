//! File storage trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::ProviderError;

/// Trait for blob storage of uploaded images and rendered videos.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores bytes and returns the URL they can be read back from.
    async fn store(&self, bytes: Vec<u8>, path_hint: &str) -> Result<String, ProviderError>;

    /// Reads bytes back by URL.
    async fn read(&self, url: &str) -> Result<Vec<u8>, ProviderError>;

    /// Deletes a stored blob. Deleting a missing blob is a no-op.
    async fn delete(&self, url: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Default)]
struct InMemoryStorageState {
    blobs: HashMap<String, Vec<u8>>,
    next_id: u32,
}

/// In-memory file storage for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStorage {
    state: Arc<RwLock<InMemoryStorageState>>,
}

impl InMemoryFileStorage {
    /// Creates a new in-memory file storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.state.read().unwrap().blobs.len()
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn store(&self, bytes: Vec<u8>, path_hint: &str) -> Result<String, ProviderError> {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let url = format!("mem://{path_hint}-{:04}", state.next_id);
        state.blobs.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let state = self.state.read().unwrap();
        state
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::new("not_found", format!("no blob at {url}")))
    }

    async fn delete(&self, url: &str) -> Result<(), ProviderError> {
        let mut state = self.state.write().unwrap();
        state.blobs.remove(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_read() {
        let storage = InMemoryFileStorage::new();

        let url = storage
            .store(b"jpeg bytes".to_vec(), "uploads/problem")
            .await
            .unwrap();
        assert!(url.starts_with("mem://uploads/problem"));

        let bytes = storage.read(&url).await.unwrap();
        assert_eq!(bytes, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_read_missing_fails() {
        let storage = InMemoryFileStorage::new();
        let result = storage.read("mem://nope").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storage = InMemoryFileStorage::new();
        let url = storage.store(b"x".to_vec(), "uploads/a").await.unwrap();

        storage.delete(&url).await.unwrap();
        storage.delete(&url).await.unwrap();
        assert_eq!(storage.blob_count(), 0);
    }
}
