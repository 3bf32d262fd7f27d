//! HTTP feature slices
//!
//! - **manifest**: `GET /work/<id>.manifest`, assembled on demand
//! - **collection**: `GET /collection/<id>`, reserved
//!
//! Each slice owns its routes and its query handlers; handlers receive the
//! collaborators they need through [`FeatureState`].

pub mod collection;
pub mod manifest;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::formats::FormatTable;
use crate::registry::AssetRegistry;
use crate::storage::MetadataStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub metadata: MetadataStore,
    pub registry: Arc<dyn AssetRegistry>,
    pub formats: Arc<FormatTable>,
    /// Limit applied to each external call made while serving a request
    pub request_timeout: Duration,
    /// Externally visible scheme and authority; derived from headers when unset
    pub public_base_url: Option<String>,
}

pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(manifest::manifest_routes().with_state(state))
        .merge(collection::collection_routes())
}
