use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::features::manifest::merge::{self, ManifestUrls};
use crate::features::FeatureState;
use crate::registry::RegistryError;
use crate::storage::MetadataError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembleManifestQuery {
    pub work_id: String,
    /// Absolute URL the manifest was requested at, without query string
    pub request_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Work reference is required and cannot be empty")]
    ReferenceRequired,
    #[error("Work '{0}' not found")]
    WorkNotFound(String),
    #[error("Asset registry error: {0}")]
    Upstream(#[from] RegistryError),
    #[error("Timed out waiting for {call}")]
    Timeout { call: &'static str },
    #[error("Base manifest is malformed: {0}")]
    MalformedManifest(String),
    #[error("Metadata store unavailable: {0}")]
    Store(MetadataError),
}

impl From<MetadataError> for ManifestError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(work_id) => Self::WorkNotFound(work_id),
            other => Self::Store(other),
        }
    }
}

impl From<merge::MalformedManifest> for ManifestError {
    fn from(err: merge::MalformedManifest) -> Self {
        Self::MalformedManifest(err.0)
    }
}

impl AssembleManifestQuery {
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.work_id.trim().is_empty() {
            return Err(ManifestError::ReferenceRequired);
        }
        Ok(())
    }
}

async fn within<T, E>(
    limit: Duration,
    call: &'static str,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, ManifestError>
where
    ManifestError: From<E>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(ManifestError::from),
        Err(_) => {
            warn!(call, timeout_ms = limit.as_millis() as u64, "External call timed out");
            Err(ManifestError::Timeout { call })
        },
    }
}

#[tracing::instrument(skip(state), fields(work_id = %query.work_id))]
pub async fn handle(state: &FeatureState, query: AssembleManifestQuery) -> Result<Value, ManifestError> {
    query.validate()?;

    let record = within(
        state.request_timeout,
        "metadata store",
        state.metadata.load(&query.work_id),
    )
    .await?;

    let body = within(
        state.request_timeout,
        "asset registry",
        state.registry.fetch_manifest(&query.work_id),
    )
    .await?;

    let mut manifest: Value = serde_json::from_str(&body)
        .map_err(|e| ManifestError::MalformedManifest(e.to_string()))?;

    let decoration = state.formats.decoration_for(record.format.as_deref());
    merge::merge(
        &mut manifest,
        &record,
        ManifestUrls::from_request_url(&query.request_url),
        decoration,
    )?;

    debug!(
        toc_entries = record.toc.len(),
        pages = record.image_metadata.len(),
        "Manifest assembled"
    );

    Ok(manifest)
}
