use crate::mirror::Asset;
use crate::state::PageStatus;
use crate::storage::{write_atomic, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a mirror run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every page was dispatched
    Completed,
    /// A stop signal prevented some pages from being dispatched
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one page, as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub name: String,
    pub origin_url: String,
    pub local_path: Option<String>,
    pub status: PageStatus,
    pub error: Option<String>,
    pub title: Option<String>,
    pub links: usize,
    pub images: usize,
    pub area_links: usize,
    pub skipped: usize,
}

/// Record of one mirror run, written to `mirror_manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorManifest {
    /// SHA-256 of the configuration file that produced the run
    pub config_hash: Option<String>,
    pub origin_base: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Physical asset downloads performed during the run
    pub downloads: usize,
    pub pages: Vec<PageRecord>,
    pub assets: Vec<Asset>,
    /// Page name -> local asset filenames referenced by the page
    pub page_assets: BTreeMap<String, Vec<String>>,
}

impl MirrorManifest {
    /// Writes the manifest as pretty-printed JSON
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| StorageError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        write_atomic(path, json.as_bytes())
    }

    /// Reads a manifest written by [`MirrorManifest::save`]
    pub fn load(path: &Path) -> StorageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| StorageError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Number of pages that ended with the given status
    pub fn count(&self, status: PageStatus) -> usize {
        self.pages.iter().filter(|p| p.status == status).count()
    }
}
