//! Tabular extractor
//!
//! Turns one tab-separated export into a [`Work`]. The first data row carries
//! the work-level fields, every following row is one page. Which columns mean
//! what is decided entirely by the matching [`FormatSpec`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use csv::StringRecord;
use tracing::{debug, instrument};
use waylon_common::types::{MetadataEntry, Work, CANVAS_LABEL_FIELD_FLAG, VIEWING_MODE_FLAG};

use crate::formats::{FormatSpec, FormatTable};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Malformed input '{file}': {reason}")]
    MalformedInput { file: String, reason: String },

    #[error("No export format registered for '{0}'")]
    UnknownFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    fn malformed(file: &str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            file: file.to_string(),
            reason: reason.into(),
        }
    }
}

/// Final path segment of an object key
pub fn file_name_hint(object_key: &str) -> &str {
    object_key.rsplit_once('/').map_or(object_key, |(_, name)| name)
}

/// Work id: the file stem with the format's fixed-length prefix removed
fn work_id(format: &FormatSpec, file_name: &str) -> Result<String, ExtractError> {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let id: String = stem.chars().skip(format.id_prefix_len).collect();

    if id.trim().is_empty() {
        return Err(ExtractError::malformed(
            file_name,
            "file name does not leave a work id after the format prefix",
        ));
    }

    Ok(id)
}

/// One row viewed through the header
struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl<'a> Row<'a> {
    /// Raw cell value, or `None` when the column is missing or blank
    fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .get(column)
            .and_then(|&i| self.record.get(i))
            .filter(|v| !v.trim().is_empty())
    }

    fn project(&self, columns: &[String]) -> Vec<MetadataEntry> {
        columns
            .iter()
            .filter_map(|column| MetadataEntry::non_empty(column, self.get(column)))
            .collect()
    }

    fn is_blank(&self) -> bool {
        self.record.iter().all(|cell| cell.trim().is_empty())
    }

    fn line(&self) -> u64 {
        self.record.position().map_or(0, |p| p.line())
    }
}

pub struct TabularExtractor {
    formats: Arc<FormatTable>,
    image_space: u32,
}

impl TabularExtractor {
    pub fn new(formats: Arc<FormatTable>, image_space: u32) -> Self {
        Self {
            formats,
            image_space,
        }
    }

    pub fn extract_path(&self, file_name_hint: &str, path: &Path) -> Result<Work, ExtractError> {
        let data = std::fs::read(path)?;
        self.extract(file_name_hint, &data)
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    pub fn extract(&self, file_name_hint: &str, data: &[u8]) -> Result<Work, ExtractError> {
        let format = self
            .formats
            .detect(file_name_hint)
            .ok_or_else(|| ExtractError::UnknownFormat(file_name_hint.to_string()))?;

        debug!(format = %format.name, "Detected export format");

        let id = work_id(format, file_name_hint)?;
        let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(data);

        let malformed = |e: csv::Error| ExtractError::malformed(file_name_hint, e.to_string());

        // A repeated header name resolves to its last column
        let columns: HashMap<String, usize> = reader
            .headers()
            .map_err(malformed)?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        if let Some(missing) = format.required_columns().find(|c| !columns.contains_key(*c)) {
            return Err(ExtractError::malformed(
                file_name_hint,
                format!("missing required column '{}'", missing),
            ));
        }

        let mut work = Work::new(id, "");
        work.format = Some(format.name.clone());

        let mut record = StringRecord::new();
        let mut saw_header_row = false;

        while reader.read_record(&mut record).map_err(malformed)? {
            let row = Row {
                record: &record,
                columns: &columns,
            };

            if row.is_blank() {
                debug!(line = row.line(), "Skipping blank row");
                continue;
            }

            if saw_header_row {
                self.add_page(format, &mut work, &row, file_name_hint)?;
            } else {
                Self::apply_work_row(format, &mut work, &row);
                saw_header_row = true;
            }
        }

        if !saw_header_row {
            return Err(ExtractError::malformed(file_name_hint, "no data rows"));
        }

        work.validate()
            .map_err(|e| ExtractError::malformed(file_name_hint, e.to_string()))?;

        debug!(
            work_id = %work.id,
            pages = work.image_collection.len(),
            toc_entries = work.toc.len(),
            "Extracted work"
        );

        Ok(work)
    }

    fn apply_work_row(format: &FormatSpec, work: &mut Work, row: &Row<'_>) {
        work.label = row.get(&format.title_column).unwrap_or_default().to_string();
        work.work_metadata = row.project(&format.work_columns);

        if let Some(mode) = format.viewing_mode_column.as_deref().and_then(|c| row.get(c)) {
            work.flags
                .insert(VIEWING_MODE_FLAG.to_string(), mode.trim().to_string());
        }
        if let Some(ref field) = format.canvas_label_field {
            work.flags
                .insert(CANVAS_LABEL_FIELD_FLAG.to_string(), field.clone());
        }
    }

    fn add_page(
        &self,
        format: &FormatSpec,
        work: &mut Work,
        row: &Row<'_>,
        file_name: &str,
    ) -> Result<(), ExtractError> {
        let image_file = row.get(&format.filename_column).map(str::trim).ok_or_else(|| {
            ExtractError::malformed(
                file_name,
                format!("line {} has no '{}'", row.line(), format.filename_column),
            )
        })?;

        let ordinal = work.push_image(
            self.image_space,
            format!("{}{}", format.origin_prefix, image_file),
        );

        if let Some(contents) = row.get(&format.contents_column) {
            for title in contents
                .split(format.contents_delimiter.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
            {
                work.add_toc_entry(title, ordinal);
            }
        }

        work.image_metadata
            .insert(ordinal, row.project(&format.page_columns));

        Ok(())
    }
}
