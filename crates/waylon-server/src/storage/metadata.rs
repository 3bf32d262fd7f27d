//! Metadata store adapter
//!
//! One JSON [`WorkRecord`] per work, stored under `work-<id>` in the metadata
//! bucket. A record that cannot be decoded is reported exactly like a missing
//! one: callers never see a partial record.

use std::sync::Arc;
use tracing::{instrument, warn};
use waylon_common::types::{Work, WorkRecord};

use super::{ObjectStore, StorageError};

const RECORD_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("No metadata stored for work '{0}'")]
    NotFound(String),

    #[error("Metadata store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to encode metadata: {0}")]
    Serialization(#[from] waylon_common::WaylonError),
}

#[derive(Clone)]
pub struct MetadataStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl MetadataStore {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn record_key(work_id: &str) -> String {
        format!("work-{}", work_id)
    }

    /// Persist everything but the image sequence of `work`
    #[instrument(skip(self, work), fields(work_id = %work.id))]
    pub async fn store(&self, work: &Work) -> Result<(), MetadataError> {
        self.store_record(&work.id, &work.to_record()).await
    }

    #[instrument(skip(self, record))]
    pub async fn store_record(&self, work_id: &str, record: &WorkRecord) -> Result<(), MetadataError> {
        let body = record.to_json()?;
        self.store
            .put_object(
                &self.bucket,
                &Self::record_key(work_id),
                body,
                Some(RECORD_CONTENT_TYPE),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn load(&self, work_id: &str) -> Result<WorkRecord, MetadataError> {
        let bytes = match self.store.get_object(&self.bucket, &Self::record_key(work_id)).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound { .. }) => {
                return Err(MetadataError::NotFound(work_id.to_string()))
            },
            Err(e) => return Err(e.into()),
        };

        WorkRecord::from_json(&bytes).map_err(|e| {
            warn!(work_id, error = %e, "Stored metadata is malformed; treating as absent");
            MetadataError::NotFound(work_id.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use waylon_common::types::MetadataEntry;

    fn metadata_store() -> (MemoryStore, MetadataStore) {
        let objects = MemoryStore::new();
        let store = MetadataStore::new(Arc::new(objects.clone()), "meta");
        (objects, store)
    }

    #[tokio::test]
    async fn test_store_then_load_keeps_non_empty_fields() {
        let (objects, store) = metadata_store();
        let mut work = Work::new("b1234", "Farriery Notes");
        work.work_metadata.push(MetadataEntry::new("Date", "1851"));
        work.push_image(1, "origin/p1.jpg");
        work.add_toc_entry("Shoeing", 0);

        store.store(&work).await.unwrap();
        assert!(objects.get("meta", "work-b1234").is_some());

        let loaded = store.load("b1234").await.unwrap();
        assert_eq!(loaded, work.to_record());
        assert_eq!(loaded.toc["Shoeing"], vec![0]);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let (_, store) = metadata_store();
        let err = store.load("absent").await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(id) if id == "absent"));
    }

    #[tokio::test]
    async fn test_load_malformed_is_not_found() {
        let (objects, store) = metadata_store();
        objects.insert("meta", "work-garbled", "{\"meta\": [ {\"label\": ");

        let err = store.load("garbled").await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }
}
