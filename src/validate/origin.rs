//! Live re-checks of sampled pages against the origin
//!
//! Origin requests are serialized with a politeness delay between them. An
//! unreachable origin means the page cannot be scored; it never counts as a
//! mirror failure.

use crate::mirror::FetchClient;
use crate::url::{origin_url_for_page, PageStyle};
use crate::validate::checks::{find_error_marker, MirrorPage};
use crate::validate::findings::{Category, ValidationFinding};
use crate::validate::report::percentage;
use crate::FetchError;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// What the origin answered for one sampled page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginOutcome {
    /// 2xx with a body of this many bytes
    Available(usize),
    /// The origin answered with a final error status
    Failed(u16),
    /// The origin could not be reached
    Unreachable(String),
}

/// What the mirror served for one sampled page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Available(usize),
    Failed(String),
}

/// Both sides of one sampled page
#[derive(Debug, Clone)]
pub struct PageSample {
    pub name: String,
    pub origin_url: Url,
    pub origin: OriginOutcome,
    pub mirror: MirrorOutcome,
}

impl PageSample {
    /// Returns true if the page counts towards accessibility
    pub fn is_scored(&self) -> bool {
        !matches!(self.origin, OriginOutcome::Unreachable(_))
    }

    /// Returns true if both origin and mirror served the page
    pub fn is_accessible(&self) -> bool {
        matches!(
            (&self.origin, &self.mirror),
            (OriginOutcome::Available(_), MirrorOutcome::Available(_))
        )
    }

    /// `min(len) / max(len)` of the two bodies, if both were served
    pub fn size_ratio(&self) -> Option<f64> {
        match (&self.origin, &self.mirror) {
            (OriginOutcome::Available(origin), MirrorOutcome::Available(mirror)) => {
                let (min, max) = if origin <= mirror {
                    (*origin, *mirror)
                } else {
                    (*mirror, *origin)
                };
                Some(if max == 0 { 1.0 } else { min as f64 / max as f64 })
            }
            _ => None,
        }
    }
}

/// Re-queries sampled pages on the origin and reads them from the mirror
pub struct OriginSampler<'a> {
    pub client: &'a FetchClient,
    pub origin_base: &'a Url,
    pub page_style: PageStyle,
    pub politeness_delay: Duration,
    /// Where the mirror is served, if it is served
    pub mirror_base: Option<&'a Url>,
    pub error_markers: &'a [String],
}

impl OriginSampler<'_> {
    /// Samples the given pages in order, one origin request at a time
    pub async fn sample(&self, pages: &[MirrorPage]) -> Vec<PageSample> {
        let mut samples = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            if i > 0 && !self.politeness_delay.is_zero() {
                tokio::time::sleep(self.politeness_delay).await;
            }

            let origin_url = match origin_url_for_page(self.origin_base, &page.name, self.page_style) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Cannot sample {}: {}", page.name, e);
                    continue;
                }
            };

            let origin = match self.client.fetch(&origin_url).await {
                Ok(resource) => OriginOutcome::Available(resource.body.len()),
                Err(FetchError::Permanent { status, .. }) => OriginOutcome::Failed(status),
                Err(e @ FetchError::Transient { .. }) => OriginOutcome::Unreachable(e.to_string()),
            };
            let mirror = self.mirror_side(page).await;
            debug!("Sampled {}: origin {:?}, mirror {:?}", page.name, origin, mirror);

            samples.push(PageSample {
                name: page.name.clone(),
                origin_url,
                origin,
                mirror,
            });
        }

        info!("Sampled {} pages on the origin", samples.len());
        samples
    }

    async fn mirror_side(&self, page: &MirrorPage) -> MirrorOutcome {
        let Some(mirror_base) = self.mirror_base else {
            return local_outcome(page, self.error_markers);
        };

        let url = match mirror_base.join(&page.name) {
            Ok(url) => url,
            Err(e) => return MirrorOutcome::Failed(e.to_string()),
        };
        match self.client.fetch(&url).await {
            Ok(resource) => {
                let body = resource.text();
                match find_error_marker(&body, self.error_markers) {
                    Some(marker) => MirrorOutcome::Failed(format!("served an error page ('{}')", marker)),
                    None => MirrorOutcome::Available(resource.body.len()),
                }
            }
            Err(e) => MirrorOutcome::Failed(e.to_string()),
        }
    }
}

/// Mirror side of a sample when the mirror is read from disk
fn local_outcome(page: &MirrorPage, error_markers: &[String]) -> MirrorOutcome {
    if page.size == 0 {
        return MirrorOutcome::Failed("page file is empty".to_string());
    }
    match find_error_marker(&page.content, error_markers) {
        Some(marker) => MirrorOutcome::Failed(format!("page file is an error page ('{}')", marker)),
        None => MirrorOutcome::Available(page.size),
    }
}

/// Accessibility score and findings
///
/// Pages whose origin was unreachable are excluded from the denominator.
///
/// # Returns
///
/// The score (`None` when no page could be scored) and the findings.
pub fn score_accessibility(samples: &[PageSample]) -> (Option<f64>, Vec<ValidationFinding>) {
    let mut findings = Vec::new();
    let mut scored = 0;
    let mut accessible = 0;

    for sample in samples {
        let subject = Some(sample.name.as_str());
        match (&sample.origin, &sample.mirror) {
            (OriginOutcome::Unreachable(reason), _) => {
                findings.push(ValidationFinding::info(
                    Category::Accessibility,
                    subject,
                    format!("origin unreachable, page not scored: {}", reason),
                ));
                continue;
            }
            (OriginOutcome::Available(_), MirrorOutcome::Available(_)) => accessible += 1,
            (OriginOutcome::Available(_), MirrorOutcome::Failed(reason)) => {
                findings.push(ValidationFinding::high(
                    Category::Accessibility,
                    subject,
                    format!("origin serves the page but the mirror does not: {}", reason),
                ));
            }
            (OriginOutcome::Failed(status), MirrorOutcome::Available(_)) => {
                findings.push(ValidationFinding::info(
                    Category::Accessibility,
                    subject,
                    format!("origin answers HTTP {}; the mirror still has the page", status),
                ));
            }
            (OriginOutcome::Failed(status), MirrorOutcome::Failed(reason)) => {
                findings.push(ValidationFinding::medium(
                    Category::Accessibility,
                    subject,
                    format!("origin answers HTTP {} and the mirror fails: {}", status, reason),
                ));
            }
        }
        scored += 1;
    }

    (percentage(accessible, scored), findings)
}

/// Content fidelity score and size-mismatch findings
///
/// The score is the mean size ratio of the pages both sides served.
pub fn score_fidelity(samples: &[PageSample], floor: f64) -> (Option<f64>, Vec<ValidationFinding>) {
    let mut findings = Vec::new();
    let mut ratios = Vec::new();

    for sample in samples {
        let Some(ratio) = sample.size_ratio() else {
            continue;
        };
        if ratio < floor {
            findings.push(ValidationFinding::medium(
                Category::ContentFidelity,
                Some(&sample.name),
                format!(
                    "size mismatch: mirror and origin bodies differ ({:.0}% similar, floor {:.0}%)",
                    ratio * 100.0,
                    floor * 100.0
                ),
            ));
        }
        ratios.push(ratio);
    }

    if ratios.is_empty() {
        return (None, findings);
    }
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    (Some(mean * 100.0), findings)
}
