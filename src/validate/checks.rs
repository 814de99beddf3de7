//! Checks that only need the mirror on disk
//!
//! Every reference is resolved the way a browser opening the mirror from the
//! file system would resolve it: relative to the `file:` URL of its page.

use crate::mirror::{extract_references, hash_bytes, Reference, ReferenceKind};
use crate::storage::{MirrorLayout, StorageError, StorageResult};
use crate::url::SiteScope;
use crate::validate::findings::{Category, ValidationFinding};
use crate::validate::report::percentage;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use url::Url;

/// Bodies shorter than this are reported as suspiciously short
const MIN_BODY_BYTES: usize = 500;

/// A page file read back from the mirror
#[derive(Debug, Clone)]
pub struct MirrorPage {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
    /// Size of the file in bytes
    pub size: usize,
}

/// Reads every page file of the mirror, sorted by name
pub fn load_mirror_pages(layout: &MirrorLayout) -> StorageResult<Vec<MirrorPage>> {
    layout
        .list_pages()?
        .into_iter()
        .map(|name| -> StorageResult<MirrorPage> {
            let path = layout.page_path(&name);
            let bytes = std::fs::read(&path).map_err(|source| StorageError::Read {
                path: path.clone(),
                source,
            })?;
            Ok(MirrorPage {
                size: bytes.len(),
                content: String::from_utf8_lossy(&bytes).into_owned(),
                name,
                path,
            })
        })
        .collect()
}

/// Returns the first error marker found in `content`
pub fn find_error_marker<'a>(content: &str, markers: &'a [String]) -> Option<&'a str> {
    markers
        .iter()
        .map(String::as_str)
        .find(|marker| !marker.is_empty() && content.contains(marker))
}

/// Outcome of one scored check
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    pub checked: usize,
    pub failed: usize,
    pub findings: Vec<ValidationFinding>,
}

impl CheckOutcome {
    /// Share of checked items that passed, `None` if nothing was checked
    pub fn score(&self) -> Option<f64> {
        percentage(self.checked.saturating_sub(self.failed), self.checked)
    }
}

/// References of a mirror page as seen from its `file:` URL
fn page_references(page: &MirrorPage, pages_dir: &Url) -> Vec<Reference> {
    let Ok(base) = pages_dir.join(&page.name) else {
        return Vec::new();
    };
    let mirror_scope = SiteScope::new(pages_dir, &[]);
    extract_references(&page.name, &page.content, &base, &mirror_scope).references
}

/// Path a local reference points at, if it points into the file system
fn local_target(reference: &Reference) -> Option<PathBuf> {
    if !reference.is_internal() {
        return None;
    }
    reference.target_url()?.to_file_path().ok()
}

/// Readable name of a local target, relative to `dir` when inside it
fn target_label(path: &Path, dir: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Checks that every internal page-to-page reference has a target file
///
/// Links that still point at the origin host are reported but not scored.
/// Links to third-party sites are ignored.
///
/// # Arguments
///
/// * `pages` - The mirror pages
/// * `pages_dir` - `file:` URL of the pages directory
/// * `origin` - The origin site, to recognise links left pointing at it
pub fn check_links(pages: &[MirrorPage], pages_dir: &Url, origin: &SiteScope) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    let dir = pages_dir.to_file_path().unwrap_or_default();

    for page in pages {
        for reference in page_references(page, pages_dir) {
            if !reference.kind.is_link() {
                continue;
            }

            if let Some(path) = local_target(&reference) {
                outcome.checked += 1;
                if !path.is_file() {
                    outcome.failed += 1;
                    outcome.findings.push(ValidationFinding::high(
                        Category::LinkIntegrity,
                        Some(&page.name),
                        format!(
                            "{} '{}' in {} points to missing page '{}'",
                            reference.kind,
                            reference.raw_value,
                            page.name,
                            target_label(&path, &dir)
                        ),
                    ));
                }
            } else if reference.target_url().is_some_and(|url| origin.contains(&url)) {
                outcome.findings.push(ValidationFinding::medium(
                    Category::LinkIntegrity,
                    Some(&page.name),
                    format!(
                        "{} '{}' still points at the origin",
                        reference.kind, reference.raw_value
                    ),
                ));
            }
        }
    }

    outcome
}

/// Checks that every image reference resolves to a local file
///
/// Images still loaded from the origin host count as missing. Third-party
/// images are ignored.
///
/// # Returns
///
/// The outcome and the names of the asset files referenced by the pages.
pub fn check_images(
    pages: &[MirrorPage],
    pages_dir: &Url,
    origin: &SiteScope,
    assets_dir: &Path,
) -> (CheckOutcome, HashSet<String>) {
    let mut outcome = CheckOutcome::default();
    let mut referenced = HashSet::new();
    let assets_dir = assets_dir
        .canonicalize()
        .unwrap_or_else(|_| assets_dir.to_path_buf());

    for page in pages {
        for reference in page_references(page, pages_dir) {
            if reference.kind != ReferenceKind::Image {
                continue;
            }

            if let Some(path) = local_target(&reference) {
                outcome.checked += 1;
                if path.is_file() {
                    let in_assets = path
                        .parent()
                        .and_then(|parent| parent.canonicalize().ok())
                        .is_some_and(|parent| parent == assets_dir);
                    if in_assets {
                        if let Some(name) = path.file_name() {
                            referenced.insert(name.to_string_lossy().into_owned());
                        }
                    }
                } else {
                    outcome.failed += 1;
                    outcome.findings.push(ValidationFinding::high(
                        Category::AssetCompleteness,
                        Some(&page.name),
                        format!("image '{}' is missing from the mirror", reference.raw_value),
                    ));
                }
            } else if reference.target_url().is_some_and(|url| origin.contains(&url)) {
                outcome.checked += 1;
                outcome.failed += 1;
                outcome.findings.push(ValidationFinding::high(
                    Category::AssetCompleteness,
                    Some(&page.name),
                    format!(
                        "image '{}' is still loaded from the origin",
                        reference.raw_value
                    ),
                ));
            }
        }
    }

    (outcome, referenced)
}

/// Result of scanning the assets directory
#[derive(Debug, Clone, Default)]
pub struct AssetFilesOutcome {
    pub files: usize,
    /// Files whose content duplicates an earlier file
    pub duplicates: usize,
    pub unreferenced: usize,
    pub findings: Vec<ValidationFinding>,
}

/// Scans the assets directory for duplicated and unreferenced files
pub fn check_asset_files(
    layout: &MirrorLayout,
    referenced: &HashSet<String>,
) -> StorageResult<AssetFilesOutcome> {
    let files = layout.list_assets()?;
    let mut outcome = AssetFilesOutcome {
        files: files.len(),
        ..AssetFilesOutcome::default()
    };
    let mut by_hash: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for file in &files {
        let path = layout.asset_path(file);
        let bytes = std::fs::read(&path).map_err(|source| StorageError::Read { path, source })?;
        by_hash.entry(hash_bytes(&bytes)).or_default().push(file.clone());

        if !referenced.contains(file) {
            outcome.unreferenced += 1;
            outcome.findings.push(ValidationFinding::info(
                Category::AssetCompleteness,
                None,
                format!("asset '{}' is not referenced by any page", file),
            ));
        }
    }

    for group in by_hash.values().filter(|group| group.len() > 1) {
        outcome.duplicates += group.len() - 1;
        outcome.findings.push(ValidationFinding::medium(
            Category::AssetCompleteness,
            None,
            format!(
                "low dedup yield: {} files share identical content ({})",
                group.len(),
                group.join(", ")
            ),
        ));
    }

    Ok(outcome)
}

/// Looks for error pages and damaged markup
pub fn check_structure(pages: &[MirrorPage], error_markers: &[String]) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    for page in pages {
        let subject = Some(page.name.as_str());

        if let Some(marker) = find_error_marker(&page.content, error_markers) {
            findings.push(ValidationFinding::high(
                Category::Structure,
                subject,
                format!("page is an error page (contains '{}')", marker),
            ));
        }

        let lowered = page.content.to_ascii_lowercase();
        if !lowered.contains("</body>") {
            findings.push(ValidationFinding::info(
                Category::Structure,
                subject,
                "missing closing </body> tag",
            ));
        }
        let html_tags = lowered.matches("<html").count();
        if html_tags > 1 {
            findings.push(ValidationFinding::info(
                Category::Structure,
                subject,
                format!("{} <html> tags in one page", html_tags),
            ));
        }
        if page.size < MIN_BODY_BYTES {
            findings.push(ValidationFinding::info(
                Category::Structure,
                subject,
                format!("body is only {} bytes", page.size),
            ));
        }
    }

    findings
}

/// Image-map tallies across the mirror
#[derive(Debug, Clone, Default)]
pub struct ImageMapOutcome {
    /// Pages with at least one `<map>`
    pub pages_with_maps: usize,
    /// `<area>` elements inside a `<map>`
    pub areas: usize,
    /// Areas lacking `href`, `shape` or `coords`
    pub malformed_areas: usize,
    /// `usemap` values naming no map on their page
    pub dangling_usemaps: usize,
    pub findings: Vec<ValidationFinding>,
}

/// Checks that image maps on each page are usable
///
/// Every `<area>` inside a `<map>` needs `href`, `shape` and `coords`
/// (`shape="default"` covers the whole image and needs no coords). Every
/// `usemap="#name"` must name a `<map>` on the same page.
pub fn check_image_maps(pages: &[MirrorPage]) -> ImageMapOutcome {
    let mut outcome = ImageMapOutcome::default();
    let (Ok(map_selector), Ok(area_selector), Ok(usemap_selector)) = (
        Selector::parse("map"),
        Selector::parse("area"),
        Selector::parse("[usemap]"),
    ) else {
        return outcome;
    };

    for page in pages {
        let document = Html::parse_document(&page.content);
        let subject = Some(page.name.as_str());
        let mut map_names = HashSet::new();
        let mut has_map = false;

        for map in document.select(&map_selector) {
            has_map = true;
            for attribute in ["name", "id"] {
                if let Some(name) = map.value().attr(attribute) {
                    map_names.insert(name.to_string());
                }
            }

            let map_label = map.value().attr("name").unwrap_or("(unnamed)");
            for area in map.select(&area_selector) {
                outcome.areas += 1;
                let attr = |name: &str| area.value().attr(name).map(str::trim).filter(|v| !v.is_empty());

                let whole_image = attr("shape").is_some_and(|s| s.eq_ignore_ascii_case("default"));
                let missing: Vec<&str> = [
                    ("href", attr("href").is_none()),
                    ("shape", attr("shape").is_none()),
                    ("coords", !whole_image && attr("coords").is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                if !missing.is_empty() {
                    outcome.malformed_areas += 1;
                    outcome.findings.push(ValidationFinding::medium(
                        Category::Structure,
                        subject,
                        format!(
                            "area in map '{}' is missing {}",
                            map_label,
                            missing.join(", ")
                        ),
                    ));
                }
            }
        }
        if has_map {
            outcome.pages_with_maps += 1;
        }

        for element in document.select(&usemap_selector) {
            let Some(usemap) = element.value().attr("usemap") else {
                continue;
            };
            let name = usemap.trim().trim_start_matches('#');
            if !map_names.contains(name) {
                outcome.dangling_usemaps += 1;
                outcome.findings.push(ValidationFinding::medium(
                    Category::Structure,
                    subject,
                    format!("usemap '{}' names no map on the page", usemap),
                ));
            }
        }
    }

    outcome
}
