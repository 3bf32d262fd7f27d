//! Manifest assembly
//!
//! Loads the stored work record, fetches the registry's base manifest and
//! merges the two into the document served at `/work/<id>.manifest`.

pub mod merge;
pub mod queries;
pub mod routes;

pub use queries::{AssembleManifestQuery, ManifestError};
pub use routes::manifest_routes;
