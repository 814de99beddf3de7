use crate::config::MirrorConfig;
use crate::storage::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// File name of the asset mapping artifact, under the mirror root
pub const ASSET_MAPPING_FILE: &str = "asset_mapping.json";

/// File name of the run manifest, under the mirror root
pub const MANIFEST_FILE: &str = "mirror_manifest.json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem layout of a mirror
///
/// ```text
/// <root>/
///   <pages-dir>/<page name>        one file per page
///   <assets-dir>/<local filename>  deduplicated assets
///   asset_mapping.json
///   mirror_manifest.json
/// ```
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    root: PathBuf,
    pages_dir: String,
    assets_dir: String,
}

impl MirrorLayout {
    /// Creates a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>, pages_dir: &str, assets_dir: &str) -> Self {
        Self {
            root: root.into(),
            pages_dir: pages_dir.to_string(),
            assets_dir: assets_dir.to_string(),
        }
    }

    /// Creates the layout described by the `[mirror]` configuration section
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(&config.root, &config.pages_dir, &config.assets_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir_name(&self) -> &str {
        &self.assets_dir
    }

    pub fn pages_path(&self) -> PathBuf {
        self.root.join(&self.pages_dir)
    }

    pub fn assets_path(&self) -> PathBuf {
        self.root.join(&self.assets_dir)
    }

    /// Path of the mirror file for a page
    pub fn page_path(&self, name: &str) -> PathBuf {
        self.pages_path().join(name)
    }

    /// Path of an asset file
    pub fn asset_path(&self, filename: &str) -> PathBuf {
        self.assets_path().join(filename)
    }

    /// Reference value that points from a page file to an asset file
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_mirror::storage::MirrorLayout;
    ///
    /// let layout = MirrorLayout::new("./web", "pages", "assets");
    /// assert_eq!(layout.asset_href("logo_0123abcd.png"), "../assets/logo_0123abcd.png");
    /// ```
    pub fn asset_href(&self, filename: &str) -> String {
        format!("../{}/{}", self.assets_dir, filename)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.root.join(ASSET_MAPPING_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Creates the pages and assets directories if they don't exist
    pub fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [self.pages_path(), self.assets_path()] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| StorageError::CreateDir { path: dir, source })?;
        }
        Ok(())
    }

    /// Writes a page file atomically and returns its path
    pub fn write_page(&self, name: &str, content: &str) -> StorageResult<PathBuf> {
        let path = self.page_path(name);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Removes a page file left over from an earlier run
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A file was removed
    /// * `Ok(false)` - There was no file
    pub fn remove_page(&self, name: &str) -> StorageResult<bool> {
        let path = self.page_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Write { path, source }),
        }
    }

    /// Writes an asset file unless a file with that name already exists
    ///
    /// Asset names are derived from content, so an existing file already holds
    /// these bytes.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The file was written
    /// * `Ok(false)` - The file was already present
    pub fn write_asset(&self, filename: &str, bytes: &[u8]) -> StorageResult<bool> {
        let path = self.asset_path(filename);
        if path.is_file() {
            return Ok(false);
        }
        write_atomic(&path, bytes)?;
        Ok(true)
    }

    /// Lists the page files in the mirror, sorted by name
    ///
    /// A missing pages directory yields an empty list.
    pub fn list_pages(&self) -> StorageResult<Vec<String>> {
        list_files(&self.pages_path())
    }

    /// Lists the asset files in the mirror, sorted by name
    pub fn list_assets(&self) -> StorageResult<Vec<String>> {
        list_files(&self.assets_path())
    }

    /// `file:` URL of the pages directory (with trailing slash)
    ///
    /// Page-relative references resolve against this URL the same way a
    /// browser opening the mirror would resolve them.
    pub fn pages_dir_url(&self) -> StorageResult<Url> {
        let pages = self.pages_path();
        let absolute = match pages.canonicalize() {
            Ok(path) => path,
            Err(_) => std::env::current_dir()
                .map_err(|source| StorageError::Read {
                    path: pages.clone(),
                    source,
                })?
                .join(&pages),
        };
        Url::from_directory_path(&absolute).map_err(|_| StorageError::NotUrl(absolute))
    }
}

/// Writes bytes to `path` through a temporary file in the same directory
///
/// Readers never observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(
        ".{}.{}.{}.tmp",
        name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    std::fs::write(&temp, bytes).map_err(|source| StorageError::Write {
        path: temp.clone(),
        source,
    })?;

    std::fs::rename(&temp, path).map_err(|source| {
        let _ = std::fs::remove_file(&temp);
        StorageError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn list_files(dir: &Path) -> StorageResult<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StorageError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Hidden files include in-flight temporaries
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
