use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::wire::WORK_SEQUENCE;
use crate::config::env_parse;

pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://dlcs.io";
pub const DEFAULT_IMAGE_SPACE: u32 = 1;
pub const DEFAULT_RESOURCE_SPACE: u32 = 50;
pub const DEFAULT_RESOURCE_TENANT: &str = "waylon-rcdd";
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Root of the named-query endpoints (`iiif-resource`, `raw-resource`)
    pub base_url: String,
    /// Bulk image deletion endpoint
    pub delete_url: Option<String>,
    /// Bulk image registration (queue) endpoint
    pub queue_url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Space new images are registered into
    pub image_space: u32,
    /// Space and tenant segments of the named-query paths
    pub resource_space: u32,
    pub resource_tenant: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("base_url", &self.base_url)
            .field("delete_url", &self.delete_url)
            .field("queue_url", &self.queue_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("image_space", &self.image_space)
            .field("resource_space", &self.resource_space)
            .field("resource_tenant", &self.resource_tenant)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            delete_url: None,
            queue_url: None,
            api_key: None,
            api_secret: None,
            image_space: DEFAULT_IMAGE_SPACE,
            resource_space: DEFAULT_RESOURCE_SPACE,
            resource_tenant: DEFAULT_RESOURCE_TENANT.to_string(),
            timeout_secs: DEFAULT_REGISTRY_TIMEOUT_SECS,
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            base_url: env::var("REGISTRY_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_REGISTRY_BASE_URL.to_string()),
            delete_url: env::var("REGISTRY_DELETE_URL").ok(),
            queue_url: env::var("REGISTRY_QUEUE_URL").ok(),
            api_key: env::var("REGISTRY_API_KEY").ok(),
            api_secret: env::var("REGISTRY_API_SECRET").ok(),
            image_space: env_parse("REGISTRY_IMAGE_SPACE").unwrap_or(DEFAULT_IMAGE_SPACE),
            resource_space: env_parse("REGISTRY_RESOURCE_SPACE").unwrap_or(DEFAULT_RESOURCE_SPACE),
            resource_tenant: env::var("REGISTRY_RESOURCE_TENANT")
                .unwrap_or_else(|_| DEFAULT_RESOURCE_TENANT.to_string()),
            timeout_secs: env_parse("REGISTRY_TIMEOUT").unwrap_or(DEFAULT_REGISTRY_TIMEOUT_SECS),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("REGISTRY_BASE_URL cannot be empty");
        }
        if self.resource_tenant.is_empty() {
            anyhow::bail!("REGISTRY_RESOURCE_TENANT cannot be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("REGISTRY_TIMEOUT must be greater than 0");
        }
        Ok(())
    }

    /// Ingestion mutates the registry and needs its write endpoints and credentials
    pub fn validate_for_ingest(&self) -> anyhow::Result<()> {
        self.validate()?;
        if self.delete_url.is_none() {
            anyhow::bail!("REGISTRY_DELETE_URL must be set for ingestion");
        }
        if self.queue_url.is_none() {
            anyhow::bail!("REGISTRY_QUEUE_URL must be set for ingestion");
        }
        if self.api_key.is_none() || self.api_secret.is_none() {
            anyhow::bail!("REGISTRY_API_KEY and REGISTRY_API_SECRET must be set for ingestion");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn named_query_url(&self, query: &str, work_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.base_url,
            query,
            self.resource_space,
            self.resource_tenant,
            urlencoding::encode(work_id),
            WORK_SEQUENCE
        )
    }

    /// Base manifest for a work
    pub fn manifest_url(&self, work_id: &str) -> String {
        self.named_query_url("iiif-resource", work_id)
    }

    /// Registry image ids currently registered for a work
    pub fn images_url(&self, work_id: &str) -> String {
        self.named_query_url("raw-resource", work_id)
    }
}
