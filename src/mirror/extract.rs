//! Resource graph extractor
//!
//! This module parses a fetched page and extracts its typed references:
//! - Inter-page links (`<a href>`)
//! - Image sources (`<img src>`)
//! - Image-map regions (`<area href>`)
//! - The page title

use crate::url::{is_page_like, SiteScope};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;
use url::Url;

/// Kind of edge in the resource graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    /// `<a href>`
    Link,
    /// `<img src>`
    Image,
    /// `<area href>` inside an image map
    AreaLink,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 3] = [Self::Link, Self::Image, Self::AreaLink];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Image => "image",
            Self::AreaLink => "area-link",
        }
    }

    /// Returns true for kinds that point at other pages
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link | Self::AreaLink)
    }

    /// Element name carrying this kind of reference
    pub fn element(&self) -> &'static str {
        match self {
            Self::Link => "a",
            Self::Image => "img",
            Self::AreaLink => "area",
        }
    }

    /// Attribute holding the reference value
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Link | Self::AreaLink => "href",
            Self::Image => "src",
        }
    }

    fn selector(&self) -> String {
        format!("{}[{}]", self.element(), self.attribute())
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a reference stays on the mirrored site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Internal,
    External,
}

/// An edge in the resource graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Name of the page the reference was found in
    pub source_page: String,
    pub kind: ReferenceKind,
    /// Attribute value exactly as it appears in the markup
    pub raw_value: String,
    /// Absolute URL the raw value resolves to
    pub resolved_target: String,
    pub scope: Scope,
    /// Local value the attribute is rewritten to, once known
    pub rewritten_value: Option<String>,
}

impl Reference {
    pub fn is_internal(&self) -> bool {
        self.scope == Scope::Internal
    }

    /// Returns the reference with its rewritten value set
    pub fn with_rewrite(mut self, value: impl Into<String>) -> Self {
        self.rewritten_value = Some(value.into());
        self
    }

    /// Parsed form of `resolved_target`
    pub fn target_url(&self) -> Option<Url> {
        Url::parse(&self.resolved_target).ok()
    }
}

/// A reference that could not be resolved and was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedReference {
    pub kind: ReferenceKind,
    pub raw_value: String,
    pub reason: String,
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// The page title (from <title> tag)
    pub title: Option<String>,
    /// References grouped by kind, in document order within a kind, one per `(kind, raw_value)`
    pub references: Vec<Reference>,
    /// References dropped because their value could not be resolved
    pub skipped: Vec<SkippedReference>,
}

impl Extraction {
    /// References of one kind
    pub fn of_kind(&self, kind: ReferenceKind) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(move |r| r.kind == kind)
    }

    pub fn count(&self, kind: ReferenceKind) -> usize {
        self.of_kind(kind).count()
    }
}

/// Extracts typed references from page markup
#[derive(Debug, Clone)]
pub struct Extractor {
    scope: SiteScope,
}

impl Extractor {
    /// Creates an extractor classifying references against `scope`
    pub fn new(scope: SiteScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &SiteScope {
        &self.scope
    }

    /// Extracts references from a page
    ///
    /// See [`extract_references`].
    pub fn extract(&self, source_page: &str, content: &str, base_url: &Url) -> Extraction {
        extract_references(source_page, content, base_url, &self.scope)
    }
}

/// Parses page markup into a reference set
///
/// # Extraction Rules
///
/// **Include:**
/// - `<a href="...">` as `link` (same-site targets only when page-like)
/// - `<img src="...">` as `image`
/// - `<area href="...">` as `area-link` (same-site targets only when page-like)
///
/// **Ignore:**
/// - Empty and fragment-only values
/// - `javascript:`, `mailto:`, `tel:` and `data:` values
/// - Targets that are not http, https or file URLs
/// - `<a href="..." download>`
///
/// Values that cannot be resolved against `base_url` become
/// [`SkippedReference`]s; extraction carries on with the rest of the page.
///
/// # Arguments
///
/// * `source_page` - Name of the page being extracted
/// * `content` - The page markup
/// * `base_url` - URL the page was fetched from
/// * `scope` - The site, for internal/external classification
///
/// # Example
///
/// ```
/// use sumi_mirror::mirror::{extract_references, ReferenceKind};
/// use sumi_mirror::url::SiteScope;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/site/home.html").unwrap();
/// let scope = SiteScope::new(&base, &[]);
/// let html = r#"<a href="news.html">News</a><img src="img/logo.png">"#;
///
/// let extraction = extract_references("home.html", html, &base, &scope);
/// assert_eq!(extraction.count(ReferenceKind::Link), 1);
/// assert_eq!(extraction.count(ReferenceKind::Image), 1);
/// ```
pub fn extract_references(
    source_page: &str,
    content: &str,
    base_url: &Url,
    scope: &SiteScope,
) -> Extraction {
    let document = Html::parse_document(content);
    let mut extraction = Extraction {
        title: extract_title(&document),
        ..Extraction::default()
    };

    let mut seen: HashSet<(ReferenceKind, String)> = HashSet::new();

    for kind in ReferenceKind::ALL {
        let Ok(selector) = Selector::parse(&kind.selector()) else {
            continue;
        };

        for element in document.select(&selector) {
            let Some(raw_value) = element.value().attr(kind.attribute()) else {
                continue;
            };

            let classified = classify(kind, &element, raw_value, base_url, scope);
            if matches!(classified, Classified::Ignore)
                || !seen.insert((kind, raw_value.to_string()))
            {
                continue;
            }

            match classified {
                Classified::Keep(target, reference_scope) => {
                    extraction.references.push(Reference {
                        source_page: source_page.to_string(),
                        kind,
                        raw_value: raw_value.to_string(),
                        resolved_target: target.to_string(),
                        scope: reference_scope,
                        rewritten_value: None,
                    });
                }
                Classified::Skip(reason) => {
                    debug!(
                        "Skipping {} '{}' in {}: {}",
                        kind, raw_value, source_page, reason
                    );
                    extraction.skipped.push(SkippedReference {
                        kind,
                        raw_value: raw_value.to_string(),
                        reason,
                    });
                }
                Classified::Ignore => {}
            }
        }
    }

    extraction
}

enum Classified {
    Keep(Url, Scope),
    Skip(String),
    Ignore,
}

fn classify(
    kind: ReferenceKind,
    element: &ElementRef<'_>,
    raw_value: &str,
    base_url: &Url,
    scope: &SiteScope,
) -> Classified {
    let value = raw_value.trim();

    if value.is_empty() || value.starts_with('#') {
        return Classified::Ignore;
    }

    let lowered = value.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return Classified::Ignore;
    }

    if kind == ReferenceKind::Link && element.value().attr("download").is_some() {
        return Classified::Ignore;
    }

    let target = match base_url.join(value) {
        Ok(target) => target,
        Err(e) => return Classified::Skip(e.to_string()),
    };

    if !matches!(target.scheme(), "http" | "https" | "file") {
        return Classified::Ignore;
    }

    let reference_scope = if scope.contains(&target) {
        Scope::Internal
    } else {
        Scope::External
    };

    if kind.is_link() && reference_scope == Scope::Internal && !is_page_like(&target) {
        return Classified::Ignore;
    }

    Classified::Keep(target, reference_scope)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}
