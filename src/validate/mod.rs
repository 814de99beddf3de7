//! Integrity validator
//!
//! This module scores how faithfully a mirror reproduces its origin:
//! - Accessibility of a sampled page subset on both sides
//! - Link integrity of page-to-page references inside the mirror
//! - Asset completeness of image references
//! - Content fidelity as a body-size ratio
//!
//! The validator runs after the mirror is quiesced. It reads the mirror from
//! disk and shares no state with the orchestrator.

mod checks;
mod findings;
mod origin;
mod report;

pub use checks::{
    check_asset_files, check_image_maps, check_images, check_links, check_structure,
    find_error_marker, load_mirror_pages, AssetFilesOutcome, CheckOutcome, ImageMapOutcome,
    MirrorPage,
};
pub use findings::{Category, Severity, ValidationFinding};
pub use origin::{
    score_accessibility, score_fidelity, MirrorOutcome, OriginOutcome, OriginSampler, PageSample,
};
pub use report::{
    clamp_score, percentage, CategoryScores, Readiness, ValidationReport, ValidationStatistics,
    SCORE_WEIGHTS,
};

use crate::config::{Config, ValidatorConfig};
use crate::mirror::{build_http_client, FetchClient, RetryPolicy};
use crate::storage::MirrorLayout;
use crate::url::{PageStyle, SiteScope};
use crate::MirrorError;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Tunables of one validation run
#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    /// Maximum number of pages re-queried on the origin
    pub sample_size: usize,
    /// Pause between origin requests
    pub politeness_delay: Duration,
    /// Minimum acceptable `min/max` body size ratio
    pub similarity_floor: f64,
    /// Where the mirror is served; `None` reads it from disk
    pub mirror_base_url: Option<Url>,
    /// Strings identifying a body as an error page
    pub error_markers: Vec<String>,
}

impl ValidatorSettings {
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, MirrorError> {
        let mirror_base_url = config
            .mirror_base_url
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        Ok(Self {
            sample_size: config.sample_size,
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            similarity_floor: config.similarity_floor,
            mirror_base_url,
            error_markers: config.error_markers.clone(),
        })
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            sample_size: 10,
            politeness_delay: Duration::from_millis(1000),
            similarity_floor: 0.8,
            mirror_base_url: None,
            error_markers: ValidatorConfig::default().error_markers,
        }
    }
}

/// Results of the disk-only checks
struct DiskChecks {
    pages: Vec<MirrorPage>,
    links: CheckOutcome,
    images: CheckOutcome,
    files: AssetFilesOutcome,
    maps: ImageMapOutcome,
    structure: Vec<ValidationFinding>,
}

/// Compares a mirror on disk against its live origin
pub struct Validator {
    layout: MirrorLayout,
    origin_base: Url,
    page_style: PageStyle,
    aliases: Vec<String>,
    settings: ValidatorSettings,
    client: FetchClient,
}

impl Validator {
    /// Creates a validator for the mirror at `layout` and the origin at `origin_base`
    pub fn new(layout: MirrorLayout, origin_base: Url, client: FetchClient) -> Self {
        Self {
            layout,
            origin_base,
            page_style: PageStyle::default(),
            aliases: Vec::new(),
            settings: ValidatorSettings::default(),
            client,
        }
    }

    /// Builds a validator from the configuration
    ///
    /// The validator gets its own client whose retry budget is the validator's
    /// `max-retries`.
    pub fn from_config(config: &Config) -> Result<Self, MirrorError> {
        let client = FetchClient::new(
            build_http_client(&config.user_agent, &config.fetch)?,
            RetryPolicy::from_config(&config.fetch).with_max_retries(config.validator.max_retries),
        );

        Ok(Self::new(
            MirrorLayout::from_config(&config.mirror),
            Url::parse(&config.origin.base_url)?,
            client,
        )
        .with_page_style(config.origin.page_style)
        .with_aliases(config.origin.aliases.clone())
        .with_settings(ValidatorSettings::from_config(&config.validator)?))
    }

    pub fn with_page_style(mut self, page_style: PageStyle) -> Self {
        self.page_style = page_style;
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_settings(mut self, settings: ValidatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Validates the mirror
    ///
    /// Discrepancies never fail the run; they are findings. Only a mirror that
    /// cannot be read is an error.
    ///
    /// # Returns
    ///
    /// * `Ok(ValidationReport)` - Scores and findings
    /// * `Err(MirrorError)` - The mirror could not be read
    pub async fn validate(&self) -> Result<ValidationReport, MirrorError> {
        info!(
            "Validating mirror at {} against {}",
            self.layout.root().display(),
            self.origin_base
        );

        let disk = self.run_disk_checks().await?;

        let sampled: Vec<MirrorPage> = disk
            .pages
            .iter()
            .take(self.settings.sample_size)
            .cloned()
            .collect();
        let sampler = OriginSampler {
            client: &self.client,
            origin_base: &self.origin_base,
            page_style: self.page_style,
            politeness_delay: self.settings.politeness_delay,
            mirror_base: self.settings.mirror_base_url.as_ref(),
            error_markers: &self.settings.error_markers,
        };
        let samples = sampler.sample(&sampled).await;

        let (accessibility, accessibility_findings) = score_accessibility(&samples);
        let (fidelity, fidelity_findings) =
            score_fidelity(&samples, self.settings.similarity_floor);

        let mut findings = Vec::new();
        let accessibility = or_full_score(
            accessibility,
            Category::Accessibility,
            "no sampled page could be scored",
            &mut findings,
        );
        findings.extend(accessibility_findings);

        let link_integrity = or_full_score(
            disk.links.score(),
            Category::LinkIntegrity,
            "no internal links to check",
            &mut findings,
        );
        findings.extend(disk.links.findings);

        let asset_completeness = or_full_score(
            disk.images.score(),
            Category::AssetCompleteness,
            "no image references to check",
            &mut findings,
        );
        findings.extend(disk.images.findings);
        findings.extend(disk.files.findings);

        let content_fidelity = or_full_score(
            fidelity,
            Category::ContentFidelity,
            "no page was served by both origin and mirror",
            &mut findings,
        );
        findings.extend(fidelity_findings);
        findings.extend(disk.structure);
        findings.extend(disk.maps.findings);

        let statistics = ValidationStatistics {
            pages: disk.pages.len(),
            sampled: samples.len(),
            scored: samples.iter().filter(|s| s.is_scored()).count(),
            excluded: samples.iter().filter(|s| !s.is_scored()).count(),
            links: disk.links.checked,
            broken_links: disk.links.failed,
            images: disk.images.checked,
            missing_images: disk.images.failed,
            asset_files: disk.files.files,
            duplicate_files: disk.files.duplicates,
            unreferenced_files: disk.files.unreferenced,
            pages_with_maps: disk.maps.pages_with_maps,
            map_areas: disk.maps.areas,
            malformed_areas: disk.maps.malformed_areas,
            dangling_usemaps: disk.maps.dangling_usemaps,
        };

        let report = ValidationReport::new(
            self.origin_base.as_str(),
            self.layout.root().display().to_string(),
            CategoryScores::new(
                accessibility,
                link_integrity,
                asset_completeness,
                content_fidelity,
            ),
            statistics,
            findings,
        );

        info!(
            "Validation finished: overall {:.1} ({}), {} findings",
            report.overall_score,
            report.readiness,
            report.findings.len()
        );

        Ok(report)
    }

    async fn run_disk_checks(&self) -> Result<DiskChecks, MirrorError> {
        let layout = self.layout.clone();
        let origin = SiteScope::new(&self.origin_base, &self.aliases);
        let error_markers = self.settings.error_markers.clone();

        let checks = tokio::task::spawn_blocking(move || -> Result<DiskChecks, MirrorError> {
            let pages = load_mirror_pages(&layout)?;
            let pages_dir = layout.pages_dir_url()?;

            let links = check_links(&pages, &pages_dir, &origin);
            let (images, referenced) =
                check_images(&pages, &pages_dir, &origin, &layout.assets_path());
            let files = check_asset_files(&layout, &referenced)?;
            let structure = check_structure(&pages, &error_markers);
            let maps = check_image_maps(&pages);

            Ok(DiskChecks {
                pages,
                links,
                images,
                files,
                maps,
                structure,
            })
        })
        .await??;

        Ok(checks)
    }
}

/// Returns the score, or 100 with an INFO finding when nothing was scored
fn or_full_score(
    score: Option<f64>,
    category: Category,
    message: &str,
    findings: &mut Vec<ValidationFinding>,
) -> f64 {
    match score {
        Some(score) => score,
        None => {
            findings.push(ValidationFinding::info(category, None, message));
            100.0
        }
    }
}

/// Runs a complete validation
///
/// # Arguments
///
/// * `config` - The configuration the mirror was produced with
///
/// # Returns
///
/// * `Ok(ValidationReport)` - Scores and findings
/// * `Err(MirrorError)` - The validator could not be built or the mirror could not be read
pub async fn run_validation(config: &Config) -> Result<ValidationReport, MirrorError> {
    Validator::from_config(config)?.validate().await
}
