//! Declarative export-format table
//!
//! Each institution's tabular export is described by a [`FormatSpec`]: the
//! filename prefix that identifies it, which columns make up the work and page
//! metadata, and how the manifest is decorated. The table is loaded from TOML
//! at startup; the built-in table covers the RCVS library and archive exports.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use waylon_common::types::Flags;

const BUILTIN_FORMATS: &str = include_str!("default_formats.toml");

fn default_id_prefix_len() -> usize {
    4
}

fn default_contents_delimiter() -> String {
    "|".to_string()
}

fn default_paged_value() -> String {
    "2".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Failed to read format table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse format table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid format table: {0}")]
    Invalid(String),
}

/// Display hints applied to every assembled manifest of a format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    /// Stored flag whose value selects the paged viewing hint
    #[serde(default)]
    pub paged_flag: Option<String>,
    #[serde(default = "default_paged_value")]
    pub paged_value: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
}

impl Decoration {
    pub fn is_paged(&self, flags: &Flags) -> bool {
        self.paged_flag
            .as_deref()
            .and_then(|flag| flags.get(flag))
            .is_some_and(|value| *value == self.paged_value)
    }
}

/// Column layout of one institution's export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub name: String,
    /// Filename prefix that selects this format
    pub prefix: String,
    /// Characters stripped from the front of the file stem to form the work id
    #[serde(default = "default_id_prefix_len")]
    pub id_prefix_len: usize,
    pub title_column: String,
    pub filename_column: String,
    pub contents_column: String,
    #[serde(default = "default_contents_delimiter")]
    pub contents_delimiter: String,
    #[serde(default)]
    pub viewing_mode_column: Option<String>,
    /// Page metadata field that labels each canvas
    #[serde(default)]
    pub canvas_label_field: Option<String>,
    /// Prepended to each page's file name to form its registry origin
    #[serde(default)]
    pub origin_prefix: String,
    pub work_columns: Vec<String>,
    pub page_columns: Vec<String>,
    #[serde(default)]
    pub decoration: Option<Decoration>,
}

impl FormatSpec {
    /// Header columns that must be present for a file to be parsed
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        [Some(self.title_column.as_str()), Some(self.filename_column.as_str())]
            .into_iter()
            .chain(std::iter::once(self.viewing_mode_column.as_deref()))
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatTable {
    #[serde(default)]
    pub decoration: Decoration,
    pub formats: Vec<FormatSpec>,
}

impl FormatTable {
    /// The RCVS library and archive formats
    pub fn builtin() -> Result<Self, FormatError> {
        Self::parse(BUILTIN_FORMATS)
    }

    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let table: Self = toml::from_str(source)?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let source = std::fs::read_to_string(path).map_err(|source| FormatError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Load `path` when given, otherwise the built-in table
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, FormatError> {
        match path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading format table");
                Self::load(path)
            },
            None => Self::builtin(),
        }
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        if self.formats.is_empty() {
            return Err(FormatError::Invalid("no formats defined".to_string()));
        }

        let mut names = HashSet::new();
        for format in &self.formats {
            if !names.insert(format.name.as_str()) {
                return Err(FormatError::Invalid(format!(
                    "duplicate format name '{}'",
                    format.name
                )));
            }
            if format.prefix.is_empty() {
                return Err(FormatError::Invalid(format!(
                    "format '{}' has an empty prefix",
                    format.name
                )));
            }
            if format.contents_delimiter.is_empty() {
                return Err(FormatError::Invalid(format!(
                    "format '{}' has an empty contents delimiter",
                    format.name
                )));
            }
            if format.work_columns.is_empty() || format.page_columns.is_empty() {
                return Err(FormatError::Invalid(format!(
                    "format '{}' must list work and page columns",
                    format.name
                )));
            }
        }

        Ok(())
    }

    /// First format, in table order, whose prefix starts `file_name`
    pub fn detect(&self, file_name: &str) -> Option<&FormatSpec> {
        self.formats.iter().find(|f| file_name.starts_with(&f.prefix))
    }

    pub fn get(&self, name: &str) -> Option<&FormatSpec> {
        self.formats.iter().find(|f| f.name == name)
    }

    /// Decoration for records extracted with `format`, falling back to the table default
    pub fn decoration_for(&self, format: Option<&str>) -> &Decoration {
        format
            .and_then(|name| self.get(name))
            .and_then(|spec| spec.decoration.as_ref())
            .unwrap_or(&self.decoration)
    }
}
