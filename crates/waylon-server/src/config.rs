//! Configuration management
//!
//! HTTP-facing settings live here. Each external collaborator has its own
//! `from_env` config next to its client: [`crate::storage::config`],
//! [`crate::registry::config`] and [`crate::ingest::config`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default timeout applied to each external call made while serving a request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default CORS allowed origin (viewers are embedded anywhere).
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    /// Path to a TOML format table; the built-in table is used when unset
    pub formats_path: Option<PathBuf>,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Externally visible scheme and authority, e.g. `https://iiif.example.org`
    pub public_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("WAYLON_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parse("WAYLON_PORT").unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse("WAYLON_SHUTDOWN_TIMEOUT")
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                public_base_url: std::env::var("WAYLON_PUBLIC_BASE_URL")
                    .ok()
                    .map(|url| url.trim_end_matches('/').to_string())
                    .filter(|url| !url.is_empty()),
                request_timeout_secs: env_parse("WAYLON_REQUEST_TIMEOUT")
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS").unwrap_or(false),
            },
            formats_path: std::env::var("WAYLON_FORMATS").ok().map(PathBuf::from),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }

        if let Some(ref base) = self.server.public_base_url {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                anyhow::bail!("WAYLON_PUBLIC_BASE_URL must be an http(s) URL, got '{}'", base);
            }
        }

        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| o == "*") {
            anyhow::bail!("CORS credentials cannot be combined with a wildcard origin");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                public_base_url: None,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
            formats_path: None,
        }
    }
}

/// Parse an environment variable, treating absent or unparsable values as unset
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
