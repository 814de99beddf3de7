//! Storage module for the on-disk mirror
//!
//! This module owns everything the mirror writes to disk:
//! - The directory layout (pages directory, assets directory, artifacts)
//! - Atomic page and asset writes
//! - The `originURL -> localFilename` mapping artifact
//! - The run manifest
//!
//! The layout is stable across runs: the validator and later mirror runs read
//! the same paths the orchestrator writes.

mod layout;
mod manifest;
mod mapping;

pub use layout::{write_atomic, MirrorLayout, ASSET_MAPPING_FILE, MANIFEST_FILE};
pub use manifest::{MirrorManifest, PageRecord, RunStatus};
pub use mapping::AssetMapping;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the mirror
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("Path cannot be expressed as a URL: {0}")]
    NotUrl(PathBuf),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
