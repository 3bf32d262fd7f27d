//! Object storage
//!
//! [`ObjectStore`] is the seam between the pipeline and the durable object
//! store. [`Storage`] implements it over S3 (or any S3-compatible service);
//! [`memory::MemoryStore`] implements it in-process for tests and local runs.

use anyhow::anyhow;
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

pub mod config;
pub mod memory;
pub mod metadata;

pub use metadata::{MetadataError, MetadataStore};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StorageError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// Minimal object-store contract used by ingestion and manifest serving
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Copy an object to a local file, returning the number of bytes written
    async fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<u64, StorageError> {
        let data = self.get_object(bucket, key).await?;
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
}

impl Storage {
    pub async fn new(config: &config::StorageConfig) -> anyhow::Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        let sdk_config = crate::aws::sdk_config(&config.aws, "waylon-storage").await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        info!(region = %config.aws.region, "Storage client initialized");

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<ByteStream, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::not_found(bucket, key)
                } else {
                    StorageError::Backend(anyhow!(
                        "Failed to get s3://{}/{}: {}",
                        bucket,
                        key,
                        aws_sdk_s3::error::DisplayErrorContext(&e)
                    ))
                }
            })?;

        Ok(response.body)
    }
}

#[async_trait]
impl ObjectStore for Storage {
    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let data = self
            .open(bucket, key)
            .await?
            .collect()
            .await
            .map_err(|e| anyhow!("Failed to read s3://{}/{}: {}", bucket, key, e))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);

        Ok(data)
    }

    #[instrument(skip(self, body), fields(size = body.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request.send().await.map_err(|e| {
            anyhow!(
                "Failed to upload s3://{}/{}: {}",
                bucket,
                key,
                aws_sdk_s3::error::DisplayErrorContext(&e)
            )
        })?;

        info!("Successfully uploaded to s3://{}/{}", bucket, key);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<u64, StorageError> {
        let mut body = self.open(bucket, key).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| anyhow!("Failed to stream s3://{}/{}: {}", bucket, key, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded s3://{}/{} to {} ({} bytes)", bucket, key, path.display(), written);

        Ok(written)
    }
}
