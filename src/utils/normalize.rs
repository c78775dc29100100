//! Field normalization shared by every source adapter.
//!
//! All functions here are pure: no I/O, no randomness.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// Maximum number of characters kept from a description
pub const DESCRIPTION_LIMIT: usize = 500;

/// Marker appended to truncated text
pub const TRUNCATION_MARK: char = '…';

/// A publication date as far as the source specified it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubDate {
    pub year: i32,
    pub month: Option<u32>,
}

fn date_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4})[/-](\d{1,2})").expect("date regex is valid")
    })
}

impl PubDate {
    /// Find the first `YYYY/M` or `YYYY-MM` pair in free text.
    ///
    /// Year and month are returned together or not at all. A pair whose month is
    /// outside 1-12 is skipped and scanning continues.
    pub fn extract(text: &str) -> Option<Self> {
        let re = date_pair_regex();
        let mut pos = 0;
        while let Some(caps) = re.captures_at(text, pos) {
            let whole = caps.get(0)?;
            let digit_before = text[..whole.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_digit());
            let digit_after = text[whole.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());

            if digit_before || digit_after {
                // A pair may still start inside a rejected digit run
                pos = whole.start() + 1;
                continue;
            }

            let year = caps[1].parse::<i32>().ok();
            let month = caps[2].parse::<u32>().ok();
            if let (Some(year), Some(month)) = (year, month) {
                if (1..=12).contains(&month) {
                    return Some(PubDate {
                        year,
                        month: Some(month),
                    });
                }
            }
            pos = whole.end();
        }
        None
    }

    /// Parse a structured `YYYY`, `YYYY-MM` or `YYYY-MM-DD` value.
    ///
    /// Unlike [`PubDate::extract`] a bare year is accepted, since the field is
    /// explicitly a date. An unusable month leaves the month absent.
    pub fn from_iso(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let year_part = parts.next()?;
        if year_part.len() != 4 {
            return None;
        }
        let year = year_part.parse::<i32>().ok()?;
        let month = parts
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m));
        Some(PubDate { year, month })
    }
}

/// Repair a raw cover image reference into an absolute `https` URL.
///
/// - `//host/x.jpg` becomes `https://host/x.jpg`
/// - `http://` is upgraded to `https://`
/// - anything that is not then a valid https URL with a host is dropped
///
/// Repairing an already repaired URL returns it unchanged.
pub fn repair_cover_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let has_scheme = |scheme: &str| {
        raw.get(..scheme.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(scheme))
    };

    let repaired = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{}", rest)
    } else if has_scheme("http://") {
        format!("https://{}", &raw[7..])
    } else if has_scheme("https://") {
        format!("https://{}", &raw[8..])
    } else {
        return None;
    };

    let parsed = Url::parse(&repaired).ok()?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return None;
    }
    Some(repaired)
}

/// Pick the image reference from a lazy-loading `<img>`.
///
/// The lazy-load attribute wins whenever it carries a usable value; inline
/// `data:` placeholders do not count.
pub fn choose_image_source<'a>(lazy: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    let usable = |v: &&str| {
        let v = v.trim();
        !v.is_empty() && !v.starts_with("data:")
    };
    lazy.filter(usable).or(fallback.filter(usable)).map(str::trim)
}

/// Resolve a possibly relative link against the page it was found on
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") {
        return None;
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Cut text to at most `limit` characters, appending [`TRUNCATION_MARK`] when
/// anything was removed. Never splits a multi-byte character.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let mut cut = text[..byte_idx].trim_end().to_string();
            cut.push(TRUNCATION_MARK);
            cut
        }
    }
}

/// Collapse runs of whitespace (including full-width spaces) and trim
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key for loose title equality: lower-cased, keeping only letters,
/// digits and CJK characters.
pub fn title_key(title: &str) -> String {
    title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Loose title equality used for duplicate detection.
///
/// Exact equality of [`title_key`]s; a title that merely contains the other is
/// not a match.
pub fn titles_match(a: &str, b: &str) -> bool {
    title_key(a) == title_key(b)
}
