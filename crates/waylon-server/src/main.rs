//! Waylon manifest server - Main entry point

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use waylon_common::logging::{init_logging, LogConfig};

use waylon_server::{
    api,
    config::Config,
    features::FeatureState,
    formats::FormatTable,
    registry::{HttpRegistry, RegistryConfig},
    storage::{config::StorageConfig, MetadataStore, Storage},
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("waylon-server")
        .filter_directives(
            "waylon_server=debug,tower_http=debug,aws_config=warn,aws_smithy_runtime=warn,hyper=warn",
        )
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting Waylon manifest server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let formats = FormatTable::load_or_builtin(config.formats_path.as_deref())?;
    info!(formats = formats.formats.len(), "Format table loaded");

    let storage_config = StorageConfig::from_env()?;
    let storage = Storage::new(&storage_config).await?;
    info!(bucket = %storage_config.metadata_bucket, "Storage client initialized");

    let registry_config = RegistryConfig::from_env()?;
    info!(base_url = %registry_config.base_url, "Registry client configured");
    let registry = HttpRegistry::new(registry_config)?;

    let state = FeatureState {
        metadata: MetadataStore::new(Arc::new(storage), storage_config.metadata_bucket.clone()),
        registry: Arc::new(registry),
        formats: Arc::new(formats),
        request_timeout: config.server.request_timeout(),
        public_base_url: config.server.public_base_url.clone(),
    };

    api::serve(config, state).await
}
