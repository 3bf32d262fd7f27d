//! Asset registry reconciliation
//!
//! Full replace: fetch the registry's current image list for the work, delete
//! all of it, register the new sequence. If either of the first two steps
//! fails nothing new is registered, so the registry keeps its previous state.
//! Re-running after a failure between delete and register converges, since
//! the list fetched on the next run is whatever survived.

use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use waylon_common::types::Work;

use crate::registry::{AssetRegistry, RegistrationBatch, RegistryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    FetchCurrent,
    DeleteExisting,
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchCurrent => write!(f, "fetch current images"),
            Self::DeleteExisting => write!(f, "delete existing images"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Registry left untouched by this run
    #[error("Reconciliation aborted at '{step}': {source}")]
    Aborted {
        step: ReconcileStep,
        #[source]
        source: RegistryError,
    },

    /// Old images were removed but the new sequence was not accepted
    #[error("Image registration failed: {0}")]
    Registration(#[source] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub removed: usize,
    pub registered: usize,
    pub batch: RegistrationBatch,
}

#[derive(Clone)]
pub struct Reconciler {
    registry: Arc<dyn AssetRegistry>,
}

impl Reconciler {
    pub fn new(registry: Arc<dyn AssetRegistry>) -> Self {
        Self { registry }
    }

    #[instrument(skip(self, work), fields(work_id = %work.id, images = work.image_collection.len()))]
    pub async fn reconcile(&self, work: &Work) -> Result<ReconcileOutcome, ReconcileError> {
        let current = self
            .registry
            .list_work_images(&work.id)
            .await
            .map_err(|source| ReconcileError::Aborted {
                step: ReconcileStep::FetchCurrent,
                source,
            })?;

        if current.is_empty() {
            info!("No images registered for work yet");
        } else {
            self.registry
                .delete_images(&current)
                .await
                .map_err(|source| ReconcileError::Aborted {
                    step: ReconcileStep::DeleteExisting,
                    source,
                })?;
        }

        if work.image_collection.is_empty() {
            info!(removed = current.len(), "Work has no pages; nothing to register");
            return Ok(ReconcileOutcome {
                removed: current.len(),
                registered: 0,
                batch: RegistrationBatch::default(),
            });
        }

        let batch = self
            .registry
            .register_images(&work.image_collection)
            .await
            .map_err(|e| {
                warn!(removed = current.len(), "Existing images were deleted but registration failed");
                ReconcileError::Registration(e)
            })?;

        info!(
            removed = current.len(),
            registered = work.image_collection.len(),
            "Registry reconciled"
        );

        Ok(ReconcileOutcome {
            removed: current.len(),
            registered: work.image_collection.len(),
            batch,
        })
    }
}
