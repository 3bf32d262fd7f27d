use serde::{Deserialize, Serialize};
use std::env;

use crate::aws::{AwsSettings, StaticCredentials};

pub const DEFAULT_METADATA_BUCKET: &str = "waylon-metadata";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub aws: AwsSettings,
    /// Bucket holding one `work-<id>` JSON record per ingested work
    pub metadata_bucket: String,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let metadata_bucket = env::var("META_BUCKET")
            .unwrap_or_else(|_| DEFAULT_METADATA_BUCKET.to_string());
        if metadata_bucket.trim().is_empty() {
            anyhow::bail!("META_BUCKET cannot be empty");
        }

        Ok(Self {
            aws: AwsSettings {
                region: env::var("S3_REGION").unwrap_or_else(|_| "eu-west-1".to_string()),
                endpoint: env::var("S3_ENDPOINT").ok(),
                credentials: StaticCredentials::from_env(
                    &["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"],
                    &["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"],
                ),
            },
            metadata_bucket,
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }
}
