//! Registry collection wire format (Hydra)

use serde::{Deserialize, Serialize};
use waylon_common::types::Image;

pub const HYDRA_CONTEXT: &str = "http://www.w3.org/ns/hydra/context.jsonld";

/// Constant sequence slot: every work is registered as a single sequence `0`
pub const WORK_SEQUENCE: u32 = 0;

#[derive(Debug, Serialize)]
pub struct Collection<T> {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub member: Vec<T>,
}

impl<T> Collection<T> {
    pub fn new(member: Vec<T>) -> Self {
        Self {
            context: HYDRA_CONTEXT,
            kind: "Collection",
            member,
        }
    }
}

/// Registration member: `string1` carries the work id, `number2` the page ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterImage {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub space: u32,
    pub origin: String,
    pub string1: String,
    pub number1: u32,
    pub number2: usize,
}

impl From<&Image> for RegisterImage {
    fn from(image: &Image) -> Self {
        Self {
            kind: "Image",
            space: image.space,
            origin: image.origin.clone(),
            string1: image.work_key.clone(),
            number1: WORK_SEQUENCE,
            number2: image.ordinal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteImage {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub id: String,
}

impl DeleteImage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            kind: "Image",
            id: id.into(),
        }
    }
}

/// Entry of the `raw-resource` image list; the registry emits strings or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawImageId {
    Text(String),
    Number(i64),
}

impl From<RawImageId> for String {
    fn from(id: RawImageId) -> Self {
        match id {
            RawImageId::Text(s) => s,
            RawImageId::Number(n) => n.to_string(),
        }
    }
}

/// Batch document returned when a registration is queued
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationBatch {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub errors: u64,
    /// Link to the batch's failed images
    #[serde(default)]
    pub error_images: Option<String>,
    /// Link to the batch's completed images
    #[serde(default)]
    pub completed_images: Option<String>,
}

impl RegistrationBatch {
    pub fn is_completed(&self) -> bool {
        self.count == self.completed
    }
}
