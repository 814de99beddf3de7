//! Mirror orchestrator - per-page pipeline over a bounded worker pool
//!
//! This module coordinates the mirroring process, including:
//! - Planning pages from the configured page set
//! - Dispatching pages to a bounded pool of workers
//! - Running each page through fetch, extract, asset resolution, rewrite and persist
//! - Handling the stop signal
//! - Writing the mapping artifact and the run manifest

use crate::config::Config;
use crate::mirror::assets::{Asset, AssetStore};
use crate::mirror::extract::{Extractor, Reference, ReferenceKind, SkippedReference};
use crate::mirror::fetcher::FetchClient;
use crate::mirror::rewrite::rewrite_references;
use crate::state::PageStatus;
use crate::storage::{AssetMapping, MirrorLayout, MirrorManifest, PageRecord, RunStatus};
use crate::url::{origin_url_for_page, page_key, page_urls, SiteScope};
use crate::MirrorError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// One mirrored document
#[derive(Debug, Clone)]
pub struct Page {
    /// Stable identifier, also the mirror file name
    pub name: String,
    /// URL the page is fetched from
    pub origin_url: Url,
    /// Destination of the page in the mirror
    pub local_path: PathBuf,
    pub status: PageStatus,
    /// Why the page failed, if it did
    pub error: Option<String>,
    pub title: Option<String>,
    /// References with their rewritten values, once extracted
    pub references: Vec<Reference>,
    pub skipped: Vec<SkippedReference>,
}

impl Page {
    pub fn new(name: impl Into<String>, origin_url: Url, local_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            origin_url,
            local_path,
            status: PageStatus::Pending,
            error: None,
            title: None,
            references: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Moves the page to `next`, rejecting transitions the state machine forbids
    pub fn transition(&mut self, next: PageStatus) -> Result<(), MirrorError> {
        if !self.status.can_transition_to(next) {
            return Err(MirrorError::InvalidTransition {
                page: self.name.clone(),
                from: self.status,
                to: next,
            });
        }
        debug!("{}: {} -> {}", self.name, self.status, next);
        self.status = next;
        Ok(())
    }

    /// Ends the page in a failure status with a message
    ///
    /// Falls back to `persist_failed` when `status` is not reachable from the
    /// current status. Terminal pages keep their status.
    pub fn fail(&mut self, status: PageStatus, message: impl Into<String>) {
        self.error = Some(message.into());
        if self.status.can_transition_to(status) {
            self.status = status;
        } else if !self.status.is_terminal() {
            self.status = PageStatus::PersistFailed;
        }
    }

    /// Manifest record for this page
    pub fn record(&self) -> PageRecord {
        let count = |kind| self.references.iter().filter(|r| r.kind == kind).count();
        PageRecord {
            name: self.name.clone(),
            origin_url: self.origin_url.to_string(),
            local_path: self
                .status
                .is_success()
                .then(|| self.local_path.display().to_string()),
            status: self.status,
            error: self.error.clone(),
            title: self.title.clone(),
            links: count(ReferenceKind::Link),
            images: count(ReferenceKind::Image),
            area_links: count(ReferenceKind::AreaLink),
            skipped: self.skipped.len(),
        }
    }
}

/// Plans the configured page set
///
/// # Returns
///
/// * `Ok(Vec<Page>)` - One pending page per configured name, in configuration order
/// * `Err(MirrorError)` - The base URL or a page name does not form a URL
pub fn plan_pages(config: &Config, layout: &MirrorLayout) -> Result<Vec<Page>, MirrorError> {
    let base = Url::parse(&config.origin.base_url)?;

    config
        .origin
        .pages
        .iter()
        .map(|name| -> Result<Page, MirrorError> {
            let origin_url = origin_url_for_page(&base, name, config.origin.page_style)?;
            Ok(Page::new(name.as_str(), origin_url, layout.page_path(name)))
        })
        .collect()
}

/// Maps every origin URL a page may be linked under to the page name
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    by_key: HashMap<String, String>,
}

impl PageIndex {
    /// Builds the index for a page set
    ///
    /// File-style URLs are indexed first; a directory-style URL never shadows
    /// another page's file-style URL.
    pub fn build<S: AsRef<str>>(base: &Url, names: &[S]) -> Self {
        let mut by_key = HashMap::new();
        let forms: Vec<Vec<Url>> = names.iter().map(|n| page_urls(base, n.as_ref())).collect();

        for position in 0..2 {
            for (name, urls) in names.iter().zip(&forms) {
                if let Some(url) = urls.get(position) {
                    by_key
                        .entry(page_key(url))
                        .or_insert_with(|| name.as_ref().to_string());
                }
            }
        }

        Self { by_key }
    }

    /// Returns the page name a URL refers to, if it is part of the page set
    pub fn lookup(&self, url: &Url) -> Option<&str> {
        self.by_key.get(&page_key(url)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Outcome of a mirror run
#[derive(Debug, Clone)]
pub struct MirrorResult {
    /// Every page in terminal status, in configuration order
    pub pages: Vec<Page>,
    pub assets: Vec<Asset>,
    /// `originURL -> localFilename` for every available asset
    pub mapping: AssetMapping,
    /// Page name -> local asset filenames referenced by the page
    pub page_assets: BTreeMap<String, Vec<String>>,
    /// Physical asset downloads performed
    pub downloads: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MirrorResult {
    /// Number of pages that ended with the given status
    pub fn count(&self, status: PageStatus) -> usize {
        self.pages.iter().filter(|p| p.status == status).count()
    }

    pub fn page(&self, name: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.name == name)
    }

    /// Returns true if no page was left in an active status
    pub fn all_terminal(&self) -> bool {
        self.pages.iter().all(|p| p.status.is_terminal())
    }

    /// Counts by status, in status order, skipping zero counts
    pub fn status_counts(&self) -> Vec<(PageStatus, usize)> {
        PageStatus::all_states()
            .into_iter()
            .map(|status| (status, self.count(status)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    fn manifest(&self, origin_base: &str, config_hash: Option<String>) -> MirrorManifest {
        MirrorManifest {
            config_hash,
            origin_base: origin_base.to_string(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: if self.cancelled {
                RunStatus::Cancelled
            } else {
                RunStatus::Completed
            },
            downloads: self.downloads,
            pages: self.pages.iter().map(Page::record).collect(),
            assets: self.assets.clone(),
            page_assets: self.page_assets.clone(),
        }
    }
}

/// State shared by all workers of one run
struct WorkerContext {
    client: FetchClient,
    store: AssetStore,
    extractor: Extractor,
    index: PageIndex,
    layout: MirrorLayout,
}

/// Main mirror orchestrator
pub struct Orchestrator {
    config: Arc<Config>,
    layout: MirrorLayout,
    client: FetchClient,
    cancel: CancellationToken,
    config_hash: Option<String>,
}

impl Orchestrator {
    /// Creates an orchestrator with a fetch client built from the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(MirrorError)` - The HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, MirrorError> {
        let client = FetchClient::from_config(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// Creates an orchestrator using the given fetch client
    pub fn with_client(config: Config, client: FetchClient) -> Self {
        Self {
            layout: MirrorLayout::from_config(&config.mirror),
            config: Arc::new(config),
            client,
            cancel: CancellationToken::new(),
            config_hash: None,
        }
    }

    /// Records the configuration hash in the manifest
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Token that stops dispatch when cancelled
    ///
    /// In-flight pages finish or time out; pages not yet dispatched end `cancelled`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    /// Mirrors the configured page set
    pub async fn run(&self) -> Result<MirrorResult, MirrorError> {
        let pages = plan_pages(&self.config, &self.layout)?;
        self.run_pages(pages).await
    }

    /// Mirrors the given pages
    ///
    /// Page failures are recorded on the page and never abort the run. Only a
    /// mirror that cannot be laid out on disk, or an unusable base URL, is fatal.
    pub async fn run_pages(&self, pages: Vec<Page>) -> Result<MirrorResult, MirrorError> {
        let started_at = Utc::now();
        let base = Url::parse(&self.config.origin.base_url)?;
        self.layout.ensure_dirs()?;

        let names: Vec<String> = pages.iter().map(|p| p.name.clone()).collect();
        let order: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let ctx = Arc::new(WorkerContext {
            client: self.client.clone(),
            store: AssetStore::new(self.client.clone(), self.layout.clone())
                .with_previous_mapping(self.previous_mapping()),
            extractor: Extractor::new(SiteScope::new(&base, &self.config.origin.aliases)),
            index: PageIndex::build(&base, &names),
            layout: self.layout.clone(),
        });

        let concurrency = self.config.mirror.concurrency.max(1) as usize;
        info!(
            "Mirroring {} pages from {} with {} workers",
            pages.len(),
            base,
            concurrency
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut workers = JoinSet::new();
        let mut in_flight: HashMap<String, Page> = HashMap::new();
        let mut finished: Vec<Page> = Vec::with_capacity(pages.len());

        for mut page in pages {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                page.transition(PageStatus::Cancelled)?;
                finished.push(page);
                continue;
            };

            page.transition(PageStatus::Fetching)?;
            in_flight.insert(page.name.clone(), page.clone());

            let ctx = Arc::clone(&ctx);
            workers.spawn(async move {
                let _permit = permit;
                process_page(&ctx, page).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(page) => {
                    in_flight.remove(&page.name);
                    finished.push(page);
                }
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        // Pages whose worker panicked never came back
        for (_, mut page) in in_flight.drain() {
            page.fail(PageStatus::PersistFailed, "worker task failed");
            finished.push(page);
        }

        finished.sort_by_key(|page| order.get(&page.name).copied().unwrap_or(usize::MAX));

        let assets = ctx.store.snapshot();
        let result = MirrorResult {
            page_assets: page_asset_mapping(&assets),
            mapping: ctx.store.mapping(),
            downloads: ctx.store.download_count(),
            cancelled: finished.iter().any(|p| p.status == PageStatus::Cancelled),
            assets,
            pages: finished,
            started_at,
            finished_at: Utc::now(),
        };

        self.write_artifacts(&result)?;

        info!(
            "Mirror finished: {} persisted, {} fetch failed, {} persist failed, {} cancelled, {} downloads",
            result.count(PageStatus::Persisted),
            result.count(PageStatus::FetchFailed),
            result.count(PageStatus::PersistFailed),
            result.count(PageStatus::Cancelled),
            result.downloads
        );

        Ok(result)
    }

    fn previous_mapping(&self) -> AssetMapping {
        if !self.config.mirror.reuse_assets {
            return AssetMapping::new();
        }

        match AssetMapping::load(&self.layout.mapping_path()) {
            Ok(Some(mapping)) => {
                info!("Loaded {} previously mirrored assets", mapping.len());
                mapping
            }
            Ok(None) => AssetMapping::new(),
            Err(e) => {
                warn!("Ignoring previous asset mapping: {}", e);
                AssetMapping::new()
            }
        }
    }

    fn write_artifacts(&self, result: &MirrorResult) -> Result<(), MirrorError> {
        result.mapping.save(&self.layout.mapping_path())?;
        result
            .manifest(&self.config.origin.base_url, self.config_hash.clone())
            .save(&self.layout.manifest_path())?;
        Ok(())
    }
}

/// Runs one page through the pipeline; always returns it in a terminal status
async fn process_page(ctx: &WorkerContext, mut page: Page) -> Page {
    if let Err(e) = run_pipeline(ctx, &mut page).await {
        error!("{}: {}", page.name, e);
        page.fail(PageStatus::PersistFailed, e.to_string());
    }
    page
}

async fn run_pipeline(ctx: &WorkerContext, page: &mut Page) -> Result<(), MirrorError> {
    let resource = match ctx.client.fetch(&page.origin_url).await {
        Ok(resource) => resource,
        Err(e) => {
            warn!("{}: {}", page.name, e);
            page.fail(PageStatus::FetchFailed, e.to_string());

            // A page file on disk always means the page persisted
            let layout = ctx.layout.clone();
            let name = page.name.clone();
            match tokio::task::spawn_blocking(move || layout.remove_page(&name)).await? {
                Ok(true) => info!("{}: removed the file left by an earlier run", page.name),
                Ok(false) => {}
                Err(e) => warn!("{}: {}", page.name, e),
            }
            return Ok(());
        }
    };
    page.transition(PageStatus::Fetched)?;

    page.transition(PageStatus::Extracting)?;
    let content = resource.text();
    let extraction = ctx
        .extractor
        .extract(&page.name, &content, &resource.final_url);
    page.title = extraction.title;
    page.skipped = extraction.skipped;
    for skipped in &page.skipped {
        warn!(
            "{}: skipped {} '{}': {}",
            page.name, skipped.kind, skipped.raw_value, skipped.reason
        );
    }

    let mut references = Vec::with_capacity(extraction.references.len());
    for reference in extraction.references {
        references.push(resolve_reference(ctx, page, reference).await);
    }

    page.transition(PageStatus::Rewriting)?;
    let rewritten =
        rewrite_references(&content, &references).map_err(|e| MirrorError::Rewrite {
            page: page.name.clone(),
            message: e.to_string(),
        })?;
    page.references = references;

    let layout = ctx.layout.clone();
    let name = page.name.clone();
    let written = tokio::task::spawn_blocking(move || layout.write_page(&name, &rewritten)).await?;
    match written {
        Ok(path) => {
            page.local_path = path;
            page.transition(PageStatus::Persisted)?;
            info!("Persisted {}", page.name);
        }
        Err(e) => {
            warn!("{}: {}", page.name, e);
            page.fail(PageStatus::PersistFailed, e.to_string());
        }
    }

    Ok(())
}

/// Sets the rewritten value of an internal reference
///
/// External references, links outside the page set and missing assets keep
/// their raw value.
async fn resolve_reference(ctx: &WorkerContext, page: &Page, reference: Reference) -> Reference {
    if !reference.is_internal() {
        return reference;
    }
    let Some(target) = reference.target_url() else {
        return reference;
    };

    match reference.kind {
        ReferenceKind::Image => {
            match ctx
                .store
                .resolve_for_page(&page.name, &target, &page.origin_url)
                .await
            {
                Ok(filename) => {
                    let href = ctx.layout.asset_href(&filename);
                    reference.with_rewrite(href)
                }
                Err(e) => {
                    debug!("{}: keeping '{}' ({})", page.name, reference.raw_value, e);
                    reference
                }
            }
        }
        ReferenceKind::Link | ReferenceKind::AreaLink => match ctx.index.lookup(&target) {
            Some(name) => {
                let value = match target.fragment() {
                    Some(fragment) => format!("{}#{}", name, fragment),
                    None => name.to_string(),
                };
                reference.with_rewrite(value)
            }
            None => {
                debug!(
                    "{}: '{}' is outside the page set",
                    page.name, reference.raw_value
                );
                reference
            }
        },
    }
}

fn page_asset_mapping(assets: &[Asset]) -> BTreeMap<String, Vec<String>> {
    let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for asset in assets {
        if let Some(filename) = &asset.local_filename {
            for page in &asset.referencing_pages {
                mapping.entry(page.clone()).or_default().push(filename.clone());
            }
        }
    }
    for filenames in mapping.values_mut() {
        filenames.sort();
        filenames.dedup();
    }
    mapping
}

/// Runs a complete mirror operation
///
/// This function:
///
/// 1. Builds the fetch client from the configuration
/// 2. Plans the page set
/// 3. Processes every page on the worker pool
/// 4. Writes the mapping artifact and the manifest
///
/// # Arguments
///
/// * `config` - The mirror configuration
///
/// # Returns
///
/// * `Ok(MirrorResult)` - Every page ended in a terminal status
/// * `Err(MirrorError)` - The run could not start or its artifacts could not be written
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::config::load_config;
/// use sumi_mirror::mirror::run_mirror;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("mirror.toml"))?;
/// let result = run_mirror(config).await?;
/// println!("{} downloads", result.downloads);
/// # Ok(())
/// # }
/// ```
pub async fn run_mirror(config: Config) -> Result<MirrorResult, MirrorError> {
    Orchestrator::new(config)?.run().await
}
