//! Shared fakes and fixtures for the waylon-server integration tests
//!
//! - [`MemoryQueue`]: scripted notification batches, records acknowledgements
//! - [`MemoryRegistry`]: stateful registry that remembers registered images
//!   per work and logs every call
//! - [`RecordingNotifier`]: keeps failure reports for inspection
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use waylon_common::types::Image;
use waylon_server::extract::TabularExtractor;
use waylon_server::formats::FormatTable;
use waylon_server::ingest::{
    ErrorNotifier, FailureReport, IngestConfig, IngestOrchestrator, IngestPipeline,
    NotificationQueue, QueueError, QueueMessage,
};
use waylon_server::reconcile::Reconciler;
use waylon_server::registry::{AssetRegistry, RegistrationBatch, RegistryError};
use waylon_server::storage::memory::MemoryStore;
use waylon_server::storage::MetadataStore;

pub const UPLOAD_BUCKET: &str = "waylon-upload";
pub const METADATA_BUCKET: &str = "waylon-metadata";

/// A small library export: one work row and three pages
pub const LIBRARY_TSV: &str = "Work Title\tRepository\tDate\tViewing Mode\tFile name\tPage\tArticle\tContents
The Veterinarian\tRCVS\t1828\t2\t\t\t\t
\t\t\t\tp001.jpg\ti\t\tPreface
\t\t\t\tp002.jpg\t1\tOn Glanders\tOn Glanders | Notices
\t\t\t\tp003.jpg\t2\t\tOn Glanders
";

/// Object-created notification for `bucket`/`key`
pub fn notification(bucket: &str, key: &str) -> String {
    json!({
        "Records": [{
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": {"name": bucket},
                "object": {"key": key, "size": 512}
            }
        }]
    })
    .to_string()
}

pub fn message(id: &str, body: impl Into<String>) -> QueueMessage {
    QueueMessage {
        id: id.to_string(),
        receipt: format!("receipt-{}", id),
        body: body.into(),
    }
}

/// Registry base manifest with `pages` canvases, as the registry serves it
pub fn base_manifest(work_id: &str, pages: usize) -> Value {
    let canvases: Vec<Value> = (0..pages)
        .map(|i| {
            json!({
                "@id": format!("https://registry.example/canvas/c{}", i),
                "@type": "sc:Canvas",
                "label": format!("-{}-", i),
                "width": 1000,
                "height": 1400,
                "images": [{
                    "@type": "oa:Annotation",
                    "motivation": "sc:painting",
                    "resource": {"@id": format!("https://registry.example/img/{}/full/full/0/default.jpg", i)},
                    "on": format!("https://registry.example/canvas/c{}", i)
                }]
            })
        })
        .collect();

    json!({
        "@context": "http://iiif.io/api/presentation/2/context.json",
        "@id": format!("https://registry.example/iiif-resource/50/waylon-rcdd/{}/0", work_id),
        "@type": "sc:Manifest",
        "label": "Registry label",
        "sequences": [{
            "@id": "https://registry.example/sequence/s0",
            "@type": "sc:Sequence",
            "canvases": canvases
        }]
    })
}

#[derive(Default)]
pub struct MemoryQueue {
    batches: Mutex<VecDeque<Vec<QueueMessage>>>,
    acked: Mutex<Vec<String>>,
}

impl MemoryQueue {
    pub fn with_batches(batches: Vec<Vec<QueueMessage>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            acked: Mutex::new(Vec::new()),
        }
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.acked.lock().unwrap().push(message.id.clone());
        Ok(())
    }
}

/// Registry step a [`MemoryRegistry`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    List,
    Delete,
    Register,
}

#[derive(Default)]
pub struct MemoryRegistry {
    images: Mutex<HashMap<String, Vec<Image>>>,
    calls: Mutex<Vec<String>>,
    fail_at: Mutex<Option<FailAt>>,
    manifests: Mutex<HashMap<String, String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_at(&self, step: Option<FailAt>) {
        *self.fail_at.lock().unwrap() = step;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Images currently registered for `work_id`, in registration order
    pub fn images(&self, work_id: &str) -> Vec<Image> {
        self.images
            .lock()
            .unwrap()
            .get(work_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, work_id: &str, images: Vec<Image>) {
        self.images.lock().unwrap().insert(work_id.to_string(), images);
    }

    pub fn set_manifest(&self, work_id: &str, manifest: &Value) {
        self.manifests
            .lock()
            .unwrap()
            .insert(work_id.to_string(), manifest.to_string());
    }

    fn check(&self, step: FailAt) -> Result<(), RegistryError> {
        if *self.fail_at.lock().unwrap() == Some(step) {
            Err(RegistryError::Status {
                url: format!("memory://{:?}", step),
                status: 503,
            })
        } else {
            Ok(())
        }
    }

    fn image_id(image: &Image) -> String {
        format!("{}/{}", image.work_key, image.ordinal)
    }
}

#[async_trait]
impl AssetRegistry for MemoryRegistry {
    async fn list_work_images(&self, work_id: &str) -> Result<Vec<String>, RegistryError> {
        self.calls.lock().unwrap().push(format!("list {}", work_id));
        self.check(FailAt::List)?;
        Ok(self.images(work_id).iter().map(Self::image_id).collect())
    }

    async fn delete_images(&self, image_ids: &[String]) -> Result<(), RegistryError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete {}", image_ids.len()));
        self.check(FailAt::Delete)?;

        let mut images = self.images.lock().unwrap();
        for registered in images.values_mut() {
            registered.retain(|image| !image_ids.contains(&Self::image_id(image)));
        }
        Ok(())
    }

    async fn register_images(&self, images: &[Image]) -> Result<RegistrationBatch, RegistryError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("register {}", images.len()));
        self.check(FailAt::Register)?;

        let mut registered = self.images.lock().unwrap();
        for image in images {
            registered
                .entry(image.work_key.clone())
                .or_default()
                .push(image.clone());
        }

        Ok(RegistrationBatch {
            id: Some("memory/batch/1".to_string()),
            count: images.len() as u64,
            ..Default::default()
        })
    }

    async fn fetch_manifest(&self, work_id: &str) -> Result<String, RegistryError> {
        self.calls.lock().unwrap().push(format!("manifest {}", work_id));
        self.manifests
            .lock()
            .unwrap()
            .get(work_id)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                url: format!("memory://manifest/{}", work_id),
                status: 404,
            })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<FailureReport>>,
}

impl RecordingNotifier {
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorNotifier for RecordingNotifier {
    async fn notify(&self, report: &FailureReport) -> anyhow::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Everything an ingestion test needs to drive and inspect a run
pub struct IngestHarness {
    pub objects: MemoryStore,
    pub registry: Arc<MemoryRegistry>,
    pub queue: Arc<MemoryQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub metadata: MetadataStore,
    pub orchestrator: IngestOrchestrator,
    scratch: tempfile::TempDir,
}

impl IngestHarness {
    pub fn new(batches: Vec<Vec<QueueMessage>>) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let objects = MemoryStore::new();
        let registry = Arc::new(MemoryRegistry::new());
        let queue = Arc::new(MemoryQueue::with_batches(batches));
        let notifier = Arc::new(RecordingNotifier::default());
        let metadata = MetadataStore::new(Arc::new(objects.clone()), METADATA_BUCKET);

        let formats = Arc::new(FormatTable::builtin().unwrap());
        let pipeline = IngestPipeline::new(
            scratch.path(),
            Arc::new(objects.clone()),
            TabularExtractor::new(formats, 1),
            metadata.clone(),
            Reconciler::new(registry.clone()),
        );

        let config = IngestConfig {
            scratch_dir: scratch.path().to_path_buf(),
            stop_file: None,
            concurrency: 2,
            idle_backoff_secs: 0,
        };

        let orchestrator = IngestOrchestrator::new(config, queue.clone(), pipeline, notifier.clone());

        Self {
            objects,
            registry,
            queue,
            notifier,
            metadata,
            orchestrator,
            scratch,
        }
    }

    /// Scratch files left behind by the pipeline
    pub fn scratch_files(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}
