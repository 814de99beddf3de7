//! URL handling module for Sumi-Mirror
//!
//! This module provides URL normalization, domain extraction, alias wildcard
//! matching, page-name to origin-URL mapping, and same-site classification.

mod domain;
mod matcher;
mod normalize;
mod pages;

use url::Url;

// Re-export main functions
pub use domain::{extract_domain, site_host};
pub use matcher::{matches_any, matches_wildcard};
pub use normalize::{normalize_parsed, normalize_url};
pub use pages::{is_page_like, origin_url_for_page, page_key, page_stem, page_urls, PageStyle};

/// The set of hosts considered part of one site
///
/// A URL belongs to the site when its host equals the base host once both are
/// lowercased and stripped of `www.`, or when the host matches one of the alias
/// patterns. `file:` URLs belong to a `file:` base when both are host-less.
#[derive(Debug, Clone)]
pub struct SiteScope {
    host: Option<String>,
    file_based: bool,
    aliases: Vec<String>,
}

impl SiteScope {
    /// Creates a scope rooted at the given base URL
    pub fn new(base: &Url, aliases: &[String]) -> Self {
        Self {
            host: site_host(base),
            file_based: base.scheme() == "file",
            aliases: aliases.to_vec(),
        }
    }

    /// Returns true if the URL belongs to this site
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use sumi_mirror::url::SiteScope;
    ///
    /// let base = Url::parse("https://www.example.com/website/").unwrap();
    /// let scope = SiteScope::new(&base, &["*.example-cdn.net".to_string()]);
    ///
    /// assert!(scope.contains(&Url::parse("http://example.com/a.html").unwrap()));
    /// assert!(scope.contains(&Url::parse("https://img.example-cdn.net/a.png").unwrap()));
    /// assert!(!scope.contains(&Url::parse("https://other.org/").unwrap()));
    /// ```
    pub fn contains(&self, url: &Url) -> bool {
        match (&self.host, site_host(url)) {
            (Some(base_host), Some(host)) => {
                *base_host == host
                    || extract_domain(url)
                        .is_some_and(|full| matches_any(&self.aliases, &full))
            }
            (None, None) => self.file_based && url.scheme() == "file",
            _ => false,
        }
    }

    /// The base host without `www.`, if the base has one
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}
