use crate::url::site_host;
use crate::{UrlError, UrlResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// How page names map onto origin URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStyle {
    /// The name is joined to the base URL as-is (`honours.html`)
    #[default]
    File,
    /// The name is served as a directory (`honours.html` -> `honours/`)
    Directory,
}

impl PageStyle {
    /// Converts the style to its configuration string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// Returns the stem a page is served under in directory style
///
/// The extension is dropped, and so is a trailing underscore, which the origin
/// uses to keep `home_.html` from clashing with a `home` directory.
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::page_stem;
///
/// assert_eq!(page_stem("honours.html"), "honours");
/// assert_eq!(page_stem("home_.html"), "home");
/// assert_eq!(page_stem("news"), "news");
/// ```
pub fn page_stem(name: &str) -> &str {
    let stem = match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm")) =>
        {
            stem
        }
        _ => name,
    };
    match stem.strip_suffix('_') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => stem,
    }
}

/// Resolves the origin URL of a page
///
/// # Arguments
///
/// * `base` - Origin base URL (ends with '/')
/// * `name` - Page name, also the mirror file name
/// * `style` - How names map onto origin URLs
///
/// # Returns
///
/// * `Ok(Url)` - Absolute origin URL of the page
/// * `Err(UrlError)` - The name does not form a valid URL
pub fn origin_url_for_page(base: &Url, name: &str, style: PageStyle) -> UrlResult<Url> {
    let relative = match style {
        PageStyle::File => name.to_string(),
        PageStyle::Directory => match page_stem(name) {
            "index" => String::new(),
            stem => format!("{}/", stem),
        },
    };

    base.join(&relative)
        .map_err(|e| UrlError::Malformed(format!("page '{}': {}", name, e)))
}

/// Every origin URL under which a page may be linked, file style first
pub fn page_urls(base: &Url, name: &str) -> Vec<Url> {
    [PageStyle::File, PageStyle::Directory]
        .into_iter()
        .filter_map(|style| origin_url_for_page(base, name, style).ok())
        .collect()
}

/// Returns the key identifying a page URL regardless of spelling
///
/// Host comparison ignores case and `www.`; query, fragment and a trailing
/// slash are ignored.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_mirror::url::page_key;
///
/// let a = Url::parse("https://www.example.com/site/honours/#top").unwrap();
/// let b = Url::parse("https://example.com/site/honours").unwrap();
/// assert_eq!(page_key(&a), page_key(&b));
/// ```
pub fn page_key(url: &Url) -> String {
    let path = url.path();
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    format!("{}{}", site_host(url).unwrap_or_default(), path)
}

/// Returns true if the URL looks like a page rather than a downloadable file
///
/// A URL is page-like when its path ends with '/', `.html` or `.htm`, or when
/// its last segment has no extension.
pub fn is_page_like(url: &Url) -> bool {
    let path = url.path();
    if path.is_empty() || path.ends_with('/') {
        return true;
    }

    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((_, ext)) => ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"),
        None => true,
    }
}
