//! Validation report and score arithmetic

use crate::validate::findings::{Category, Severity, ValidationFinding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weights of the category scores in the overall score
///
/// Order: accessibility, link integrity, asset completeness, content fidelity.
/// Re-runs are only comparable while these stay fixed.
pub const SCORE_WEIGHTS: [f64; 4] = [0.4, 0.3, 0.2, 0.1];

/// Clamps a score into `[0, 100]`; NaN scores 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// `numerator / denominator` as a percentage, `None` for an empty denominator
pub fn percentage(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(clamp_score(numerator as f64 * 100.0 / denominator as f64))
    }
}

/// Per-category scores, each in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub accessibility: f64,
    pub link_integrity: f64,
    pub asset_completeness: f64,
    pub content_fidelity: f64,
}

impl CategoryScores {
    /// Creates scores, clamping each into `[0, 100]`
    pub fn new(
        accessibility: f64,
        link_integrity: f64,
        asset_completeness: f64,
        content_fidelity: f64,
    ) -> Self {
        Self {
            accessibility: clamp_score(accessibility),
            link_integrity: clamp_score(link_integrity),
            asset_completeness: clamp_score(asset_completeness),
            content_fidelity: clamp_score(content_fidelity),
        }
    }

    /// Scores in [`SCORE_WEIGHTS`] order
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.accessibility,
            self.link_integrity,
            self.asset_completeness,
            self.content_fidelity,
        ]
    }

    /// Weighted sum of the category scores
    pub fn overall(&self) -> f64 {
        let weighted: f64 = self
            .as_array()
            .iter()
            .zip(SCORE_WEIGHTS)
            .map(|(score, weight)| score * weight)
            .sum();
        clamp_score(weighted)
    }

    /// Score of a scored category
    pub fn get(&self, category: Category) -> Option<f64> {
        match category {
            Category::Accessibility => Some(self.accessibility),
            Category::LinkIntegrity => Some(self.link_integrity),
            Category::AssetCompleteness => Some(self.asset_completeness),
            Category::ContentFidelity => Some(self.content_fidelity),
            Category::Structure => None,
        }
    }
}

/// Deployment readiness derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    MostlyReady,
    NeedsMinorWork,
    NeedsMajorWork,
}

impl Readiness {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Readiness::Ready
        } else if score >= 80.0 {
            Readiness::MostlyReady
        } else if score >= 70.0 {
            Readiness::NeedsMinorWork
        } else {
            Readiness::NeedsMajorWork
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Ready => "ready",
            Readiness::MostlyReady => "mostly_ready",
            Readiness::NeedsMinorWork => "needs_minor_work",
            Readiness::NeedsMajorWork => "needs_major_work",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts gathered while validating
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Pages present in the mirror
    pub pages: usize,
    /// Pages re-queried on the origin
    pub sampled: usize,
    /// Sampled pages that counted towards accessibility
    pub scored: usize,
    /// Sampled pages excluded because the origin was unreachable
    pub excluded: usize,
    /// Internal links checked
    pub links: usize,
    pub broken_links: usize,
    /// Image references checked
    pub images: usize,
    pub missing_images: usize,
    /// Files in the assets directory
    pub asset_files: usize,
    /// Asset files whose content duplicates another file
    pub duplicate_files: usize,
    pub unreferenced_files: usize,
    /// Pages containing at least one image map
    #[serde(default)]
    pub pages_with_maps: usize,
    #[serde(default)]
    pub map_areas: usize,
    /// Map areas lacking `href`, `shape` or `coords`
    #[serde(default)]
    pub malformed_areas: usize,
    #[serde(default)]
    pub dangling_usemaps: usize,
}

/// Result of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub origin_base: String,
    pub mirror_root: String,
    pub scores: CategoryScores,
    pub overall_score: f64,
    pub readiness: Readiness,
    pub statistics: ValidationStatistics,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    /// Assembles a report; the overall score and readiness derive from `scores`
    pub fn new(
        origin_base: impl Into<String>,
        mirror_root: impl Into<String>,
        scores: CategoryScores,
        statistics: ValidationStatistics,
        findings: Vec<ValidationFinding>,
    ) -> Self {
        let overall_score = scores.overall();
        Self {
            generated_at: Utc::now(),
            origin_base: origin_base.into(),
            mirror_root: mirror_root.into(),
            scores,
            overall_score,
            readiness: Readiness::from_score(overall_score),
            statistics,
            findings,
        }
    }

    /// Findings with the given severity
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings_with(severity).count()
    }

    /// Findings about one category
    pub fn findings_in(&self, category: Category) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(move |f| f.category == category)
    }
}
