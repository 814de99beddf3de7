use crate::storage::{write_atomic, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The `originURL -> localFilename` mapping artifact
///
/// Written once per mirror run and read back by later runs that want to skip
/// re-downloading assets they already hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetMapping {
    entries: BTreeMap<String, String>,
}

impl AssetMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, origin_url: impl Into<String>, local_filename: impl Into<String>) {
        self.entries.insert(origin_url.into(), local_filename.into());
    }

    pub fn get(&self, origin_url: &str) -> Option<&str> {
        self.entries.get(origin_url).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(originURL, localFilename)` pairs in URL order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Loads a mapping artifact
    ///
    /// # Returns
    ///
    /// * `Ok(Some(mapping))` - The artifact was read
    /// * `Ok(None)` - No artifact exists at `path`
    /// * `Err(StorageError)` - The artifact exists but could not be read or parsed
    pub fn load(path: &Path) -> StorageResult<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Format {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Writes the mapping as pretty-printed JSON
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| StorageError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        write_atomic(path, json.as_bytes())
    }
}

impl FromIterator<(String, String)> for AssetMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
