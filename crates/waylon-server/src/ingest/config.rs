//! Ingestion configuration
//!
//! Worker settings (`INGEST_*`, scratch and stop files) and the notification
//! queue connection (`QUEUE_*`, `INPUT_QUEUE`, `ERROR_QUEUE_URL`).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::aws::{AwsSettings, StaticCredentials};
use crate::config::env_parse;

pub const DEFAULT_STOP_FILE: &str = "/tmp/waylon-stop.txt";
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_IDLE_BACKOFF_SECS: u64 = 5;

pub const DEFAULT_INPUT_QUEUE: &str = "waylon-input";
pub const DEFAULT_MESSAGES_PER_FETCH: i32 = 10;
pub const DEFAULT_WAIT_SECS: i32 = 20;
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i32 = 120;

/// Ingestion worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory holding one scratch file per in-flight message
    pub scratch_dir: PathBuf,
    /// The polling loop exits when this file exists
    pub stop_file: Option<PathBuf>,
    /// Messages processed in parallel within one batch
    pub concurrency: usize,
    /// Pause after an empty or failed receive
    pub idle_backoff_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scratch_dir: env::temp_dir(),
            stop_file: Some(PathBuf::from(DEFAULT_STOP_FILE)),
            concurrency: DEFAULT_CONCURRENCY,
            idle_backoff_secs: DEFAULT_IDLE_BACKOFF_SECS,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            scratch_dir: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            stop_file: match env::var("WAYLON_STOP_FILE") {
                Ok(path) if path.trim().is_empty() => None,
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => defaults.stop_file,
            },
            concurrency: env_parse("INGEST_CONCURRENCY").unwrap_or(DEFAULT_CONCURRENCY),
            idle_backoff_secs: env_parse("INGEST_IDLE_BACKOFF_SECS")
                .unwrap_or(DEFAULT_IDLE_BACKOFF_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("INGEST_CONCURRENCY must be greater than 0");
        }
        Ok(())
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_secs(self.idle_backoff_secs)
    }
}

/// Notification queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub aws: AwsSettings,
    /// Queue name or full queue URL
    pub input_queue: String,
    /// Failure reports are published here when set, otherwise only logged
    pub error_queue_url: Option<String>,
    pub messages_per_fetch: i32,
    pub wait_secs: i32,
    pub visibility_timeout_secs: i32,
}

impl QueueConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            aws: AwsSettings {
                region: env::var("QUEUE_REGION")
                    .or_else(|_| env::var("AWS_REGION"))
                    .unwrap_or_else(|_| "eu-west-1".to_string()),
                endpoint: env::var("QUEUE_ENDPOINT").ok(),
                credentials: StaticCredentials::from_env(
                    &["QUEUE_ACCESS_KEY", "AWS_ACCESS_KEY_ID"],
                    &["QUEUE_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"],
                ),
            },
            input_queue: env::var("INPUT_QUEUE").unwrap_or_else(|_| DEFAULT_INPUT_QUEUE.to_string()),
            error_queue_url: env::var("ERROR_QUEUE_URL").ok().filter(|u| !u.trim().is_empty()),
            messages_per_fetch: env_parse("MESSAGES_PER_FETCH")
                .unwrap_or(DEFAULT_MESSAGES_PER_FETCH),
            wait_secs: env_parse("QUEUE_WAIT_SECS").unwrap_or(DEFAULT_WAIT_SECS),
            visibility_timeout_secs: env_parse("QUEUE_VISIBILITY_TIMEOUT")
                .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.input_queue.trim().is_empty() {
            anyhow::bail!("INPUT_QUEUE cannot be empty");
        }
        if !(1..=10).contains(&self.messages_per_fetch) {
            anyhow::bail!(
                "MESSAGES_PER_FETCH must be between 1 and 10, got {}",
                self.messages_per_fetch
            );
        }
        if !(0..=20).contains(&self.wait_secs) {
            anyhow::bail!("QUEUE_WAIT_SECS must be between 0 and 20, got {}", self.wait_secs);
        }
        if self.visibility_timeout_secs < 0 {
            anyhow::bail!("QUEUE_VISIBILITY_TIMEOUT cannot be negative");
        }
        Ok(())
    }

    /// Whether `input_queue` is already a URL rather than a queue name
    pub fn input_is_url(&self) -> bool {
        self.input_queue.starts_with("http://") || self.input_queue.starts_with("https://")
    }
}
