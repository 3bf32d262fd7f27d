//! Merging stored work metadata into a registry base manifest
//!
//! The base manifest is edited in place as an order-preserving JSON tree;
//! keys already present keep their position, added keys are appended.

use serde_json::{json, Map, Value};
use tracing::warn;
use waylon_common::types::{MetadataEntry, WorkRecord};

use crate::formats::Decoration;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MalformedManifest(pub String);

/// Where the rewritten identifiers point
#[derive(Debug, Clone, Copy)]
pub struct ManifestUrls<'a> {
    /// Manifest `@id`; canvas and sequence ids hang off it
    pub work_id: &'a str,
    /// Prefix for range ids
    pub range_base: &'a str,
}

impl<'a> ManifestUrls<'a> {
    /// Derive both from the request URL (without query string)
    pub fn from_request_url(request_url: &'a str) -> Self {
        Self {
            work_id: request_url.strip_suffix(".manifest").unwrap_or(request_url),
            range_base: request_url,
        }
    }
}

fn object_mut<'v>(value: &'v mut Value, what: &str) -> Result<&'v mut Map<String, Value>, MalformedManifest> {
    value
        .as_object_mut()
        .ok_or_else(|| MalformedManifest(format!("{} is not an object", what)))
}

fn first_sequence(doc: &mut Map<String, Value>) -> Result<&mut Map<String, Value>, MalformedManifest> {
    let sequence = doc
        .get_mut("sequences")
        .and_then(Value::as_array_mut)
        .and_then(|s| s.first_mut())
        .ok_or_else(|| MalformedManifest("manifest has no sequence".to_string()))?;
    object_mut(sequence, "sequence")
}

fn canvases(doc: &mut Map<String, Value>) -> Result<&mut Vec<Value>, MalformedManifest> {
    first_sequence(doc)?
        .get_mut("canvases")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| MalformedManifest("sequence has no canvases".to_string()))
}

/// Point the manifest, its sequence and every canvas at `work_id`.
///
/// Returns the new canvas ids in canvas order.
pub fn rewrite_ids(manifest: &mut Value, work_id: &str) -> Result<Vec<String>, MalformedManifest> {
    let doc = object_mut(manifest, "manifest")?;
    doc.insert("@id".to_string(), json!(work_id));
    first_sequence(doc)?.insert("@id".to_string(), json!(format!("{}/sequences/0", work_id)));

    let mut canvas_ids = Vec::new();
    for (ordinal, canvas) in canvases(doc)?.iter_mut().enumerate() {
        let canvas_id = format!("{}/canvas/{}", work_id, ordinal);
        let canvas = object_mut(canvas, "canvas")?;
        canvas.insert("@id".to_string(), json!(canvas_id));

        if let Some(images) = canvas.get_mut("images").and_then(Value::as_array_mut) {
            for image in images.iter_mut().filter_map(Value::as_object_mut) {
                image.insert("on".to_string(), json!(canvas_id));
            }
        }
        canvas_ids.push(canvas_id);
    }

    Ok(canvas_ids)
}

/// Label for a page: the value of the configured label field, else its 1-based ordinal.
///
/// A configured field that the page lacks yields an empty label.
pub fn canvas_label(ordinal: usize, entries: &[MetadataEntry], label_field: Option<&str>) -> String {
    match label_field {
        Some(field) => entries
            .iter()
            .rev()
            .find(|e| e.label == field)
            .map(|e| e.value.clone())
            .unwrap_or_default(),
        None => (ordinal + 1).to_string(),
    }
}

pub fn apply_image_metadata(manifest: &mut Value, record: &WorkRecord) -> Result<(), MalformedManifest> {
    let label_field = record.canvas_label_field();
    let pages = canvases(object_mut(manifest, "manifest")?)?;
    let count = pages.len();

    for (&ordinal, entries) in &record.image_metadata {
        let Some(canvas) = pages.get_mut(ordinal).and_then(Value::as_object_mut) else {
            warn!(ordinal, canvases = count, "Stored page metadata has no matching canvas");
            continue;
        };
        canvas.insert("metadata".to_string(), json!(entries));
        canvas.insert(
            "label".to_string(),
            json!(canvas_label(ordinal, entries, label_field)),
        );
    }

    Ok(())
}

/// One range per TOC entry, in stored order
pub fn build_structures(record: &WorkRecord, canvas_ids: &[String], range_base: &str) -> Vec<Value> {
    record
        .toc
        .iter()
        .enumerate()
        .map(|(index, (title, pages))| {
            let canvases: Vec<&str> = pages
                .iter()
                .filter_map(|&page| {
                    let id = canvas_ids.get(page).map(String::as_str);
                    if id.is_none() {
                        warn!(page, range = %title, "TOC page has no matching canvas");
                    }
                    id
                })
                .collect();

            json!({
                "@type": "sc:Range",
                "@id": format!("{}/range/r-{}", range_base, index),
                "label": title,
                "canvases": canvases,
            })
        })
        .collect()
}

pub fn apply_decoration(
    manifest: &mut Value,
    record: &WorkRecord,
    decoration: &Decoration,
) -> Result<(), MalformedManifest> {
    let doc = object_mut(manifest, "manifest")?;

    if decoration.is_paged(&record.flags) {
        first_sequence(doc)?.insert("viewingHint".to_string(), json!("paged"));
    }
    if let Some(ref logo) = decoration.logo {
        doc.insert("logo".to_string(), json!(logo));
    }
    if let Some(ref attribution) = decoration.attribution {
        doc.insert("attribution".to_string(), json!(attribution));
    }

    Ok(())
}

/// Full merge of `record` into `manifest`
pub fn merge(
    manifest: &mut Value,
    record: &WorkRecord,
    urls: ManifestUrls<'_>,
    decoration: &Decoration,
) -> Result<(), MalformedManifest> {
    let canvas_ids = rewrite_ids(manifest, urls.work_id)?;

    let doc = object_mut(manifest, "manifest")?;
    doc.insert("metadata".to_string(), json!(record.meta));
    if !record.toc.is_empty() {
        doc.insert(
            "structures".to_string(),
            Value::Array(build_structures(record, &canvas_ids, urls.range_base)),
        );
    }

    apply_image_metadata(manifest, record)?;
    apply_decoration(manifest, record, decoration)
}
