//! Shared helpers for reading storefront HTML.

use scraper::{ElementRef, Selector};

use super::SourceError;
use crate::utils::normalize::{self, choose_image_source};

/// Attributes storefronts use to defer image loading, most specific first
const LAZY_IMAGE_ATTRS: &[&str] = &["data-src", "data-original", "data-lazy-src"];

/// Phrases that only show up on anti-automation interstitials
const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "cf-chl",
    "verify you are human",
    "access denied",
    "請確認您不是機器人",
];

pub(crate) fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector `{}`: {}", css, e)))
}

/// Whitespace-collapsed text content of an element
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    normalize::clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text content with one line per text node, for label/value scanning
pub(crate) fn lines_of(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the first descendant matching `sel`, if non-empty
pub(crate) fn first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Image reference of an `<img>`, lazy-load attribute first.
///
/// Relative paths are resolved against the page; protocol-relative and
/// absolute references are left for the cover repair step.
pub(crate) fn image_reference(img: ElementRef<'_>, page_url: &str) -> Option<String> {
    let element = img.value();
    let lazy = LAZY_IMAGE_ATTRS
        .iter()
        .filter_map(|attr| element.attr(attr))
        .find(|v| !v.trim().is_empty());
    let chosen = choose_image_source(lazy, element.attr("src"))?;

    if chosen.starts_with("//") || chosen.contains("://") {
        Some(chosen.to_string())
    } else {
        normalize::resolve_link(page_url, chosen)
    }
}

/// Value following `label` and a colon, on the same or the next line.
///
/// `labels` are tried in order; a label occurrence not followed by a colon
/// (e.g. `出版日` inside `出版日期`) is skipped.
pub(crate) fn labelled_value(text: &str, labels: &[&str]) -> Option<String> {
    labels.iter().find_map(|label| {
        text.match_indices(label).find_map(|(idx, _)| {
            let rest = &text[idx + label.len()..];
            let rest = rest
                .strip_prefix('：')
                .or_else(|| rest.strip_prefix(':'))?;
            let value = rest.trim_start().lines().next()?.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    })
}

/// Drop a leading `label：` / `label:` prefix from a field value
pub(crate) fn strip_label(value: &str, labels: &[&str]) -> String {
    let value = value.trim();
    for label in labels {
        if let Some(rest) = value.strip_prefix(label) {
            let rest = rest.trim_start();
            if let Some(rest) = rest.strip_prefix('：').or_else(|| rest.strip_prefix(':')) {
                return rest.trim().to_string();
            }
        }
    }
    value.to_string()
}

/// Name the marker when a page looks like an anti-automation interstitial
pub(crate) fn blocked_marker(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    BLOCK_MARKERS.iter().copied().find(|m| lower.contains(m))
}
