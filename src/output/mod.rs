//! Output module for run summaries and report artifacts
//!
//! This module handles:
//! - Writing JSON artifacts (the validation report)
//! - Formatting console summaries of mirror and validation runs

mod summary;

pub use summary::{
    format_mirror_summary, format_validation_report, print_mirror_summary,
    print_validation_report,
};

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes a value as pretty-printed JSON, creating parent directories
///
/// # Arguments
///
/// * `value` - The value to serialize
/// * `path` - Destination file
///
/// # Returns
///
/// * `Ok(())` - The artifact was written
/// * `Err(OutputError)` - Serialization or the write failed
pub fn write_json_artifact<T: Serialize + ?Sized>(value: &T, path: &Path) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;

    Ok(())
}
