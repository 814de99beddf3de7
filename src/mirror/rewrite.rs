//! Reference rewriting built on `lol_html`.
//!
//! Rewriting is a pure function of the page content and its typed references:
//! only attributes whose value matches a reference carrying a rewritten value are
//! touched, and each is touched once.

use crate::mirror::extract::{Reference, ReferenceKind};
use html_escape::decode_html_entities;
use lol_html::errors::RewritingError;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use std::collections::HashMap;

/// Rewrites reference attributes of `content` to their local values
///
/// A reference is matched by `(kind, raw_value)`. References without a
/// rewritten value (external targets, pages outside the mirror, missing assets)
/// leave their attribute unchanged. When no reference carries a rewritten value
/// the content is returned as-is.
///
/// # Example
///
/// ```
/// use sumi_mirror::mirror::{rewrite_references, Reference, ReferenceKind, Scope};
///
/// let reference = Reference {
///     source_page: "home.html".to_string(),
///     kind: ReferenceKind::Image,
///     raw_value: "/img/logo.png".to_string(),
///     resolved_target: "https://example.com/img/logo.png".to_string(),
///     scope: Scope::Internal,
///     rewritten_value: Some("../assets/logo_0011223344556677.png".to_string()),
/// };
///
/// let html = r#"<img src="/img/logo.png">"#;
/// let rewritten = rewrite_references(html, &[reference]).unwrap();
/// assert_eq!(rewritten, r#"<img src="../assets/logo_0011223344556677.png">"#);
/// ```
pub fn rewrite_references(
    content: &str,
    references: &[Reference],
) -> Result<String, RewritingError> {
    let mut rewrites: HashMap<(ReferenceKind, &str), &str> = HashMap::new();
    for reference in references {
        if let Some(value) = reference.rewritten_value.as_deref() {
            rewrites.insert((reference.kind, reference.raw_value.as_str()), value);
        }
    }

    if rewrites.is_empty() {
        return Ok(content.to_string());
    }

    let rewrites = &rewrites;
    let element_content_handlers = ReferenceKind::ALL
        .into_iter()
        .filter(|kind| rewrites.keys().any(|(k, _)| k == kind))
        .map(|kind| {
            let selector = format!("{}[{}]", kind.element(), kind.attribute());
            element!(selector, move |el| {
                if kind == ReferenceKind::Link && el.has_attribute("download") {
                    return Ok(());
                }

                let attribute = kind.attribute();
                if let Some(current) = el.get_attribute(attribute) {
                    if let Some(value) = lookup(rewrites, kind, &current) {
                        el.set_attribute(attribute, value)?;
                    }
                }
                Ok(())
            })
        })
        .collect();

    rewrite_str(
        content,
        RewriteStrSettings {
            element_content_handlers,
            ..RewriteStrSettings::default()
        },
    )
}

/// Finds the rewritten value for an attribute as the rewriter sees it
///
/// The extractor sees entity-decoded values; the rewriter sees them as written.
fn lookup<'a>(
    rewrites: &HashMap<(ReferenceKind, &str), &'a str>,
    kind: ReferenceKind,
    current: &str,
) -> Option<&'a str> {
    if let Some(value) = rewrites.get(&(kind, current)).copied() {
        return Some(value);
    }

    if current.contains('&') {
        let decoded = decode_html_entities(current);
        return rewrites.get(&(kind, decoded.as_ref())).copied();
    }

    None
}
