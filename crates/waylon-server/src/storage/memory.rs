//! In-process object store for tests and local runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{ObjectStore, StorageError};

#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get(bucket, key)
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.insert(bucket, key, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_object("bucket", "nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_download_to_file_writes_bytes() {
        let store = MemoryStore::new();
        store.insert("incoming", "lib_abc.tsv", "Work Title\n");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch");

        let written = store
            .download_to_file("incoming", "lib_abc.tsv", &path)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Work Title\n");
    }
}
