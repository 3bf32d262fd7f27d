//! Waylon Server Library
//!
//! Turns tabular catalogue exports into IIIF presentation manifests.
//!
//! # Overview
//!
//! Two processes share this library:
//!
//! - **Ingestion** (`waylon-ingest`): consumes object-created notifications,
//!   extracts a [`Work`](waylon_common::types::Work) from the uploaded file,
//!   persists its metadata record and reconciles its page images with the
//!   asset registry
//! - **Manifest server** (`waylon-server`): answers `GET /work/<id>.manifest`
//!   by merging the registry's base manifest with the stored record
//!
//! # Architecture
//!
//! - **Formats**: per-institution column layouts, loaded from TOML
//! - **Extract**: tab-delimited export -> canonical work
//! - **Storage**: S3 objects and the `work-<id>` metadata records
//! - **Registry**: HTTP client for the external image registry
//! - **Reconcile**: replace a work's registered images with a new sequence
//! - **Ingest**: queue polling, per-message pipeline, failure reports
//! - **Features**: HTTP slices (manifest assembly, reserved collections)
//!
//! ## Framework Stack
//!
//! - **Axum** and **Tower**: HTTP server and middleware
//! - **reqwest**: registry client
//! - **AWS SDK**: S3 downloads and record storage, SQS notifications
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use waylon_server::{
//!     api,
//!     config::Config,
//!     features::FeatureState,
//!     formats::FormatTable,
//!     registry::{HttpRegistry, RegistryConfig},
//!     storage::{config::StorageConfig, MetadataStore, Storage},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let storage_config = StorageConfig::from_env()?;
//!     let storage = Storage::new(&storage_config).await?;
//!     let state = FeatureState {
//!         metadata: MetadataStore::new(Arc::new(storage), storage_config.metadata_bucket),
//!         registry: Arc::new(HttpRegistry::new(RegistryConfig::from_env()?)?),
//!         formats: Arc::new(FormatTable::builtin()?),
//!         request_timeout: config.server.request_timeout(),
//!         public_base_url: config.server.public_base_url.clone(),
//!     };
//!     api::serve(config, state).await
//! }
//! ```

pub mod api;
pub mod aws;
pub mod config;
pub mod extract;
pub mod features;
pub mod formats;
pub mod ingest;
pub mod middleware;
pub mod reconcile;
pub mod registry;
pub mod shutdown;
pub mod storage;

// Re-export commonly used types
pub use extract::{ExtractError, TabularExtractor};
pub use reconcile::{ReconcileError, Reconciler};
