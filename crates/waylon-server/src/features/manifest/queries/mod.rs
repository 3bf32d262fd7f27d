pub mod assemble_manifest;

pub use assemble_manifest::{AssembleManifestQuery, ManifestError};
