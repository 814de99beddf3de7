use serde::{Deserialize, Serialize};
use std::fmt;

/// Area of the mirror a finding concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Accessibility,
    LinkIntegrity,
    AssetCompleteness,
    ContentFidelity,
    /// Page markup problems; reported but not scored
    Structure,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Accessibility => "accessibility",
            Category::LinkIntegrity => "link_integrity",
            Category::AssetCompleteness => "asset_completeness",
            Category::ContentFidelity => "content_fidelity",
            Category::Structure => "structure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a finding matters
///
/// Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Broken mirror-only page, broken link, missing asset
    High,
    /// Size mismatch, low dedup yield
    Medium,
    /// Acceptable but notable
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrepancy between the mirror and the origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub category: Category,
    pub severity: Severity,
    /// Page the finding is about, if it is about one page
    pub subject_page: Option<String>,
    pub message: String,
}

impl ValidationFinding {
    pub fn new(
        category: Category,
        severity: Severity,
        subject_page: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            subject_page: subject_page.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn high(category: Category, subject_page: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(category, Severity::High, subject_page, message)
    }

    pub fn medium(
        category: Category,
        subject_page: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(category, Severity::Medium, subject_page, message)
    }

    pub fn info(category: Category, subject_page: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Info, subject_page, message)
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject_page {
            Some(page) => write!(
                f,
                "[{}] {} ({}): {}",
                self.severity, self.category, page, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.severity, self.category, self.message),
        }
    }
}
