//! Waylon Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared model, error handling and logging for the Waylon workspace.
//!
//! # Overview
//!
//! - **Types**: the canonical work model produced by ingestion and the
//!   metadata record persisted for manifest assembly
//! - **Error Handling**: `WaylonError` and its result alias
//! - **Logging**: tracing subscriber bootstrap shared by both binaries
//!
//! # Example
//!
//! ```no_run
//! use waylon_common::types::{MetadataEntry, Work};
//!
//! let mut work = Work::new("abc123", "Veterinary Journal, Vol. 1");
//! work.work_metadata.push(MetadataEntry::new("Volume", "1"));
//! work.validate().unwrap();
//! let record = work.to_record();
//! assert_eq!(record.meta.len(), 1);
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, WaylonError};
