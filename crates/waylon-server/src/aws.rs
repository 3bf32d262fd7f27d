//! Shared AWS SDK configuration for the S3 and SQS clients

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};

/// Connection settings common to every AWS-compatible service we talk to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSettings {
    pub region: String,
    /// Custom endpoint (MinIO, ElasticMQ, LocalStack); `None` for AWS itself
    pub endpoint: Option<String>,
    /// Static credentials; `None` falls back to the default provider chain
    pub credentials: Option<StaticCredentials>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

impl StaticCredentials {
    /// Read a key pair from the first set variable of each candidate list
    pub fn from_env(access_vars: &[&str], secret_vars: &[&str]) -> Option<Self> {
        let first = |names: &[&str]| names.iter().find_map(|n| std::env::var(n).ok());
        Some(Self {
            access_key: first(access_vars)?,
            secret_key: first(secret_vars)?,
        })
    }
}

/// Build an SDK configuration from the given settings
pub async fn sdk_config(settings: &AwsSettings, provider_name: &'static str) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));

    if let Some(ref endpoint) = settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(ref creds) = settings.credentials {
        loader = loader.credentials_provider(Credentials::new(
            &creds.access_key,
            &creds.secret_key,
            None,
            None,
            provider_name,
        ));
    }

    loader.load().await
}
