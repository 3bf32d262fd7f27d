//! Canonical work model shared by ingestion and manifest assembly
//!
//! A [`Work`] is built fresh from every ingested file and lives only for the
//! duration of that run. What survives is the [`WorkRecord`] (everything but
//! the image sequence) in the metadata store, and the image sequence in the
//! asset registry. Both sides agree on one convention: page ordinals are
//! zero-based and contiguous in source row order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, WaylonError};

/// Flag naming the page-level metadata field that doubles as the canvas label.
pub const CANVAS_LABEL_FIELD_FLAG: &str = "Canvas_Label_Field";

/// Flag carrying the source's display mode (paged or continuous).
pub const VIEWING_MODE_FLAG: &str = "Viewing_Mode";

/// Table of contents: title -> ordered page ordinals, in first-seen order.
pub type Toc = IndexMap<String, Vec<usize>>;

/// Institution-specific display hints.
pub type Flags = IndexMap<String, String>;

/// Page ordinal -> that page's metadata entries.
pub type ImageMetadata = BTreeMap<usize, Vec<MetadataEntry>>;

/// A single `{label, value}` metadata pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub label: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Build an entry only when `value` carries non-whitespace content.
    ///
    /// Empty fields are dropped, never stored as empty strings. Other values
    /// are kept as written.
    pub fn non_empty(label: &str, value: Option<&str>) -> Option<Self> {
        let value = value?;
        if value.trim().is_empty() {
            None
        } else {
            Some(Self::new(label, value))
        }
    }
}

/// One page image belonging to a work.
///
/// The registry assigns the image's own identifier on registration; this
/// system only knows where the image comes from and where it sits in the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Registry space the image is registered into
    pub space: u32,
    /// Storage origin resolvable by the registry
    pub origin: String,
    /// Stable per-work key (the work id)
    pub work_key: String,
    /// Zero-based position within the work
    pub ordinal: usize,
}

/// In-memory representation of one ingested work
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Work {
    pub id: String,
    pub label: String,
    /// Name of the export format the work was extracted with
    pub format: Option<String>,
    pub work_metadata: Vec<MetadataEntry>,
    pub flags: Flags,
    pub toc: Toc,
    pub image_metadata: ImageMetadata,
    pub image_collection: Vec<Image>,
}

impl Work {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    /// Append an image at the next ordinal and return that ordinal
    pub fn push_image(&mut self, space: u32, origin: impl Into<String>) -> usize {
        let ordinal = self.image_collection.len();
        self.image_collection.push(Image {
            space,
            origin: origin.into(),
            work_key: self.id.clone(),
            ordinal,
        });
        ordinal
    }

    /// Record that page `ordinal` belongs to the section `title`.
    ///
    /// Titles keep first-seen order; a page is listed at most once per title.
    pub fn add_toc_entry(&mut self, title: &str, ordinal: usize) {
        let pages = self.toc.entry(title.to_string()).or_default();
        if pages.last() != Some(&ordinal) {
            pages.push(ordinal);
        }
    }

    /// Check the ordinal invariants between images, TOC and page metadata
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(WaylonError::invalid_work(&self.id, "work id is empty"));
        }

        for (position, image) in self.image_collection.iter().enumerate() {
            if image.ordinal != position {
                return Err(WaylonError::invalid_work(
                    &self.id,
                    format!("image at position {} has ordinal {}", position, image.ordinal),
                ));
            }
        }

        let count = self.image_collection.len();

        for (title, pages) in &self.toc {
            if let Some(bad) = pages.iter().find(|&&page| page >= count) {
                return Err(WaylonError::invalid_work(
                    &self.id,
                    format!("toc entry '{}' references page {} of {}", title, bad, count),
                ));
            }
        }

        if let Some(bad) = self.image_metadata.keys().find(|&&page| page >= count) {
            return Err(WaylonError::invalid_work(
                &self.id,
                format!("image metadata references page {} of {}", bad, count),
            ));
        }

        Ok(())
    }

    /// Project the persisted part of the work (everything but the images)
    pub fn to_record(&self) -> WorkRecord {
        WorkRecord {
            id: Some(self.id.clone()),
            label: Some(self.label.clone()).filter(|l| !l.trim().is_empty()),
            format: self.format.clone(),
            meta: self.work_metadata.clone(),
            toc: self.toc.clone(),
            flags: self.flags.clone(),
            image_metadata: self.image_metadata.clone(),
        }
    }
}

/// Canonical metadata persisted per work id.
///
/// Empty `toc`, `flags` and `image_metadata` are omitted on write and read
/// back as empty, so "absent" and "empty" are the same thing to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Flat work-level metadata, in source column order
    #[serde(default)]
    pub meta: Vec<MetadataEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub toc: Toc,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub flags: Flags,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_metadata: ImageMetadata,
}

impl WorkRecord {
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    /// Page metadata field whose value labels each canvas, if configured
    pub fn canvas_label_field(&self) -> Option<&str> {
        self.flag(CANVAS_LABEL_FIELD_FLAG)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_work() -> Work {
        let mut work = Work::new("abc123", "The Veterinarian");
        work.work_metadata.push(MetadataEntry::new("Work Title", "The Veterinarian"));
        for page in 0..3 {
            let ordinal = work.push_image(1, format!("s3://bucket/page{}.jpg", page));
            work.image_metadata
                .insert(ordinal, vec![MetadataEntry::new("Page", format!("{}", page + 1))]);
        }
        work.add_toc_entry("Preface", 0);
        work.add_toc_entry("Chapter 1", 1);
        work.add_toc_entry("Chapter 1", 2);
        work
    }

    #[test]
    fn test_non_empty_drops_blank_values() {
        assert!(MetadataEntry::non_empty("Date", None).is_none());
        assert!(MetadataEntry::non_empty("Date", Some("")).is_none());
        assert!(MetadataEntry::non_empty("Date", Some("  \t ")).is_none());
        assert_eq!(
            MetadataEntry::non_empty("Date", Some(" 1872 ")),
            Some(MetadataEntry::new("Date", " 1872 "))
        );
    }

    #[test]
    fn test_push_image_assigns_contiguous_ordinals() {
        let work = sample_work();
        let ordinals: Vec<_> = work.image_collection.iter().map(|i| i.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(work.image_collection.iter().all(|i| i.work_key == "abc123"));
    }

    #[test]
    fn test_toc_entry_not_duplicated_for_same_page() {
        let mut work = sample_work();
        work.add_toc_entry("Preface", 0);
        assert_eq!(work.toc["Preface"], vec![0]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_toc() {
        let mut work = sample_work();
        work.add_toc_entry("Index", 7);
        let err = work.validate().unwrap_err();
        assert!(err.to_string().contains("Index"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_image_metadata() {
        let mut work = sample_work();
        work.image_metadata.insert(3, vec![]);
        assert!(work.validate().is_err());
    }

    #[test]
    fn test_record_omits_empty_containers() {
        let work = Work::new("empty", "");
        let json: serde_json::Value =
            serde_json::from_slice(&work.to_record().to_json().unwrap()).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("meta"));
        assert!(!object.contains_key("toc"));
        assert!(!object.contains_key("flags"));
        assert!(!object.contains_key("image_metadata"));
        assert!(!object.contains_key("label"));
    }

    #[test]
    fn test_record_keeps_toc_order_and_string_page_keys() {
        let record = sample_work().to_record();
        let json: serde_json::Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();
        let titles: Vec<_> = json["toc"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(titles, vec!["Preface", "Chapter 1"]);
        assert_eq!(json["image_metadata"]["2"][0]["value"], "3");

        let back = WorkRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_reads_legacy_layout() {
        let legacy = br#"{"meta":[{"label":"Work Title","value":"Box 4"}],
            "flags":{"Viewing_Mode":"2","Canvas_Label_Field":"Page"}}"#;
        let record = WorkRecord::from_json(legacy).unwrap();
        assert_eq!(record.id, None);
        assert!(record.toc.is_empty());
        assert_eq!(record.canvas_label_field(), Some("Page"));
        assert_eq!(record.flag(VIEWING_MODE_FLAG), Some("2"));
    }
}
