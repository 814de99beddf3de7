//! Content-addressed asset store
//!
//! Assets are deduplicated per normalized origin URL. The SHA-256 of the
//! downloaded bytes names the local file, so the same content under the same
//! basename always lands in the same file no matter which page asked first.
//! Concurrent resolutions of one URL share a single download.

use crate::mirror::fetcher::FetchClient;
use crate::state::AssetStatus;
use crate::storage::{AssetMapping, MirrorLayout};
use crate::url::normalize_parsed;
use crate::FetchError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

/// Hex characters of the content hash used in file names
const HASH_PREFIX_LEN: usize = 16;

/// Longest stem kept from the original basename
const MAX_STEM_LEN: usize = 64;

/// Why an asset could not be resolved to a local file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Invalid asset URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to store {url}: {message}")]
    Store { url: String, message: String },
}

/// One asset known to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Normalized origin URL (the deduplication key)
    pub origin_url: String,
    /// Hex SHA-256 of the content
    pub content_hash: Option<String>,
    pub local_filename: Option<String>,
    pub status: AssetStatus,
    pub referencing_pages: BTreeSet<String>,
    pub size: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredAsset {
    local_filename: String,
    content_hash: String,
    size: u64,
    status: AssetStatus,
}

type Resolution = Result<StoredAsset, DownloadError>;

/// Deduplicating, single-flight asset store
///
/// Shared between workers behind an `Arc`; all mutable state sits behind its
/// own lock and no lock is held across an await point.
#[derive(Debug)]
pub struct AssetStore {
    client: FetchClient,
    layout: MirrorLayout,
    previous: AssetMapping,
    entries: Mutex<HashMap<String, Arc<OnceCell<Resolution>>>>,
    references: Mutex<HashMap<String, BTreeSet<String>>>,
    downloads: AtomicUsize,
}

impl AssetStore {
    pub fn new(client: FetchClient, layout: MirrorLayout) -> Self {
        Self {
            client,
            layout,
            previous: AssetMapping::new(),
            entries: Mutex::new(HashMap::new()),
            references: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Seeds the store with a previous run's mapping
    ///
    /// Mapped files that still exist are reused instead of downloaded again.
    pub fn with_previous_mapping(mut self, mapping: AssetMapping) -> Self {
        self.previous = mapping;
        self
    }

    /// Resolves an asset URL to its local file name
    ///
    /// The first call for a URL downloads it; later and concurrent calls wait
    /// for that download and share its result, successful or not.
    ///
    /// # Arguments
    ///
    /// * `origin_url` - Absolute URL of the asset
    /// * `referer` - URL of the page referencing the asset
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Local file name under the assets directory
    /// * `Err(DownloadError)` - The asset is missing
    pub async fn resolve(&self, origin_url: &Url, referer: &Url) -> Result<String, DownloadError> {
        let key = asset_key(origin_url)?;

        let cell = {
            let mut entries = lock(&self.entries);
            Arc::clone(
                entries
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        cell.get_or_init(|| self.load(&key, referer))
            .await
            .clone()
            .map(|stored| stored.local_filename)
    }

    /// Resolves an asset on behalf of a page, recording the page as a referrer
    pub async fn resolve_for_page(
        &self,
        page: &str,
        origin_url: &Url,
        referer: &Url,
    ) -> Result<String, DownloadError> {
        if let Ok(key) = asset_key(origin_url) {
            lock(&self.references)
                .entry(key)
                .or_default()
                .insert(page.to_string());
        }
        self.resolve(origin_url, referer).await
    }

    /// Number of physical downloads started so far
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Every asset resolved so far, sorted by origin URL
    ///
    /// Resolutions still in flight are not included.
    pub fn snapshot(&self) -> Vec<Asset> {
        let entries: Vec<(String, Arc<OnceCell<Resolution>>)> = lock(&self.entries)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        let references = lock(&self.references).clone();

        let mut assets: Vec<Asset> = entries
            .into_iter()
            .filter_map(|(origin_url, cell)| {
                let resolution = cell.get()?;
                let referencing_pages = references.get(&origin_url).cloned().unwrap_or_default();
                Some(match resolution {
                    Ok(stored) => Asset {
                        origin_url,
                        content_hash: Some(stored.content_hash.clone()),
                        local_filename: Some(stored.local_filename.clone()),
                        status: stored.status,
                        referencing_pages,
                        size: Some(stored.size),
                        error: None,
                    },
                    Err(e) => Asset {
                        origin_url,
                        content_hash: None,
                        local_filename: None,
                        status: AssetStatus::Missing,
                        referencing_pages,
                        size: None,
                        error: Some(e.to_string()),
                    },
                })
            })
            .collect();

        assets.sort_by(|a, b| a.origin_url.cmp(&b.origin_url));
        assets
    }

    /// The `originURL -> localFilename` mapping of every available asset
    ///
    /// Entries of the previous mapping this run never resolved are carried
    /// over while their files still exist.
    pub fn mapping(&self) -> AssetMapping {
        let mut mapping: AssetMapping = self
            .snapshot()
            .into_iter()
            .filter_map(|asset| asset.local_filename.map(|f| (asset.origin_url, f)))
            .collect();

        let resolved: HashSet<String> = lock(&self.entries).keys().cloned().collect();
        for (origin_url, filename) in self.previous.iter() {
            if !resolved.contains(origin_url) && self.layout.asset_path(filename).is_file() {
                mapping.insert(origin_url, filename);
            }
        }
        mapping
    }

    /// Produces the resolution for a key; runs at most once per key
    async fn load(&self, key: &str, referer: &Url) -> Resolution {
        if let Some(stored) = self.reuse_previous(key).await {
            debug!("Reusing {} as {}", key, stored.local_filename);
            return Ok(stored);
        }

        let url = Url::parse(key).map_err(|e| DownloadError::InvalidUrl {
            url: key.to_string(),
            reason: e.to_string(),
        })?;

        self.downloads.fetch_add(1, Ordering::SeqCst);
        let resource = match self.client.fetch_with_referer(&url, Some(referer)).await {
            Ok(resource) => resource,
            Err(e) => {
                warn!("Asset {} is missing: {}", key, e);
                return Err(DownloadError::Fetch(e));
            }
        };

        let content_hash = hash_bytes(&resource.body);
        let local_filename = asset_filename(&url, &content_hash, resource.content_type.as_deref());
        let size = resource.body.len() as u64;

        let layout = self.layout.clone();
        let filename = local_filename.clone();
        let written = tokio::task::spawn_blocking(move || layout.write_asset(&filename, &resource.body))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()))
            .map_err(|message| DownloadError::Store {
                url: key.to_string(),
                message,
            })?;

        if written {
            info!("Stored asset {} as {}", key, local_filename);
        } else {
            debug!("Asset {} matches existing file {}", key, local_filename);
        }

        Ok(StoredAsset {
            local_filename,
            content_hash,
            size,
            status: AssetStatus::Stored,
        })
    }

    async fn reuse_previous(&self, key: &str) -> Option<StoredAsset> {
        let filename = self.previous.get(key)?;
        let bytes = tokio::fs::read(self.layout.asset_path(filename)).await.ok()?;

        Some(StoredAsset {
            local_filename: filename.to_string(),
            content_hash: hash_bytes(&bytes),
            size: bytes.len() as u64,
            status: AssetStatus::Reused,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn asset_key(origin_url: &Url) -> Result<String, DownloadError> {
    normalize_parsed(origin_url.clone())
        .map(|url| url.to_string())
        .map_err(|e| DownloadError::InvalidUrl {
            url: origin_url.to_string(),
            reason: e.to_string(),
        })
}

/// Hex SHA-256 of a byte slice
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derives the local file name of an asset
///
/// Format: `<sanitized stem>_<first 16 hex of the content hash>.<ext>`. The
/// extension comes from the URL, else from the content type, else `bin`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_mirror::mirror::asset_filename;
///
/// let url = Url::parse("https://example.com/images/Club%20Crest.GIF").unwrap();
/// let hash = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
/// assert_eq!(
///     asset_filename(&url, hash, None),
///     "Club_20Crest_0123456789abcdef.gif"
/// );
/// ```
pub fn asset_filename(url: &Url, content_hash: &str, content_type: Option<&str>) -> String {
    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let (stem, url_ext) = match basename.rsplit_once('.') {
        Some((stem, ext)) if is_plain_extension(ext) => (stem, Some(ext.to_ascii_lowercase())),
        _ => (basename, None),
    };

    let mut stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();
    if stem.trim_matches('_').is_empty() {
        stem = "asset".to_string();
    }

    let ext = url_ext
        .or_else(|| content_type.and_then(extension_for_content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());

    let hash_prefix = content_hash.get(..HASH_PREFIX_LEN).unwrap_or(content_hash);
    format!("{}_{}.{}", stem, hash_prefix, ext)
}

fn is_plain_extension(ext: &str) -> bool {
    (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    Some(match mime.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        _ => return None,
    })
}
