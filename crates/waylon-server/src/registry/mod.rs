//! Asset registry client
//!
//! The registry owns image storage, derivative generation and image ids. We
//! read its named queries (base manifest, current image list) anonymously and
//! mutate it (bulk delete, bulk register) with basic auth.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use waylon_common::types::Image;

pub mod config;
pub mod wire;

pub use config::RegistryConfig;
pub use wire::RegistrationBatch;

use wire::{Collection, DeleteImage, RawImageId, RegisterImage};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode registry response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Registry endpoint not configured: {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Ids of the images currently registered for `work_id`
    async fn list_work_images(&self, work_id: &str) -> Result<Vec<String>, RegistryError>;

    async fn delete_images(&self, image_ids: &[String]) -> Result<(), RegistryError>;

    async fn register_images(&self, images: &[Image]) -> Result<RegistrationBatch, RegistryError>;

    /// Raw base manifest document for `work_id`
    async fn fetch_manifest(&self, work_id: &str) -> Result<String, RegistryError>;
}

#[derive(Clone)]
pub struct HttpRegistry {
    client: Client,
    config: RegistryConfig,
}

impl HttpRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.api_key {
            Some(ref key) => request.basic_auth(key, self.config.api_secret.as_ref()),
            None => request,
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, RegistryError> {
        let response = self.client.get(url).send().await?;
        Ok(check_status(url, response)?.text().await?)
    }

    async fn post_collection<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &Collection<T>,
    ) -> Result<String, RegistryError> {
        let response = self
            .authorised(self.client.post(url))
            .json(body)
            .send()
            .await?;
        Ok(check_status(url, response)?.text().await?)
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RegistryError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl AssetRegistry for HttpRegistry {
    #[instrument(skip(self))]
    async fn list_work_images(&self, work_id: &str) -> Result<Vec<String>, RegistryError> {
        let url = self.config.images_url(work_id);
        let body = self.get_text(&url).await?;
        let ids: Vec<RawImageId> =
            serde_json::from_str(&body).map_err(|source| RegistryError::Decode {
                url: url.clone(),
                source,
            })?;

        debug!("Registry holds {} images for work", ids.len());

        Ok(ids.into_iter().map(String::from).collect())
    }

    #[instrument(skip(self, image_ids), fields(count = image_ids.len()))]
    async fn delete_images(&self, image_ids: &[String]) -> Result<(), RegistryError> {
        let url = self
            .config
            .delete_url
            .as_deref()
            .ok_or(RegistryError::NotConfigured("REGISTRY_DELETE_URL"))?;

        let body = Collection::new(image_ids.iter().map(DeleteImage::new).collect());
        self.post_collection(url, &body).await?;

        info!("Requested deletion of {} images", image_ids.len());

        Ok(())
    }

    #[instrument(skip(self, images), fields(count = images.len()))]
    async fn register_images(&self, images: &[Image]) -> Result<RegistrationBatch, RegistryError> {
        let url = self
            .config
            .queue_url
            .as_deref()
            .ok_or(RegistryError::NotConfigured("REGISTRY_QUEUE_URL"))?;

        let body = Collection::new(images.iter().map(RegisterImage::from).collect());
        let response = self.post_collection(url, &body).await?;

        // The images are queued once the POST succeeds, whatever the body says
        let batch: RegistrationBatch = match serde_json::from_str(&response) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Registration accepted but the batch response from {} was unreadable: {}", url, e);
                RegistrationBatch::default()
            },
        };

        info!(
            batch = batch.id.as_deref().unwrap_or("-"),
            count = batch.count,
            "Queued image registration"
        );

        Ok(batch)
    }

    #[instrument(skip(self))]
    async fn fetch_manifest(&self, work_id: &str) -> Result<String, RegistryError> {
        self.get_text(&self.config.manifest_url(work_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry(server: &MockServer) -> HttpRegistry {
        HttpRegistry::new(RegistryConfig {
            base_url: server.uri(),
            delete_url: Some(format!("{}/deleteImages", server.uri())),
            queue_url: Some(format!("{}/queue", server.uri())),
            api_key: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_work_images() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw-resource/50/waylon-rcdd/b1234/0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["2/1/a", "2/1/b"])))
            .mount(&server)
            .await;

        let ids = registry(&server).list_work_images("b1234").await.unwrap();
        assert_eq!(ids, vec!["2/1/a", "2/1/b"]);
    }

    #[tokio::test]
    async fn test_list_work_images_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = registry(&server).list_work_images("b1234").await.unwrap_err();
        assert!(matches!(err, RegistryError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_delete_images_posts_authenticated_collection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deleteImages"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "@type": "Collection",
                "member": [{"@type": "Image", "id": "2/1/a"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        registry(&server)
            .delete_images(&["2/1/a".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_images_returns_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/queue"))
            .and(body_partial_json(json!({
                "member": [{"string1": "b1234", "number1": 0, "number2": 0}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "@id": "batch/1", "count": 1, "completed": 0
            })))
            .mount(&server)
            .await;

        let image = Image {
            space: 1,
            origin: "p1.jpg".to_string(),
            work_key: "b1234".to_string(),
            ordinal: 0,
        };
        let batch = registry(&server).register_images(&[image]).await.unwrap();
        assert_eq!(batch.id.as_deref(), Some("batch/1"));
        assert_eq!(batch.count, 1);
    }

    #[tokio::test]
    async fn test_delete_without_endpoint_is_not_configured() {
        let registry = HttpRegistry::new(RegistryConfig::default()).unwrap();
        let err = registry.delete_images(&[]).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_register_images_tolerates_unreadable_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/queue"))
            .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
            .expect(1)
            .mount(&server)
            .await;

        let image = Image {
            space: 1,
            origin: "p1.jpg".to_string(),
            work_key: "b1234".to_string(),
            ordinal: 0,
        };
        let batch = registry(&server).register_images(&[image]).await.unwrap();
        assert_eq!(batch, RegistrationBatch::default());
    }
}
