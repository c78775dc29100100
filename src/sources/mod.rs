//! Metadata source adapters with a trait-based architecture.
//!
//! This module defines the [`Source`] trait that every adapter implements. Each
//! adapter knows one external source: how to build its query URL and how to read
//! its result markup or JSON. Adapters are stateless; every call is independent.
//!
//! # Built-in sources
//!
//! In ISBN priority order:
//!
//! - `momo` - momo mobile storefront; list page plus detail page for ISBN lookups
//! - `sanmin` - Sanmin bookstore search page
//! - `books_com_tw` - books.com.tw search, behind a cookie warm-up request
//! - `google_books` - Google Books volumes API, the always-available fallback
//!
//! All four also answer keyword searches.
//!
//! # Runtime Source Configuration
//!
//! - `BIBLIO_RESOLVER_ENABLED_SOURCES` - Only use these sources (e.g., "sanmin,google_books")
//! - `BIBLIO_RESOLVER_DISABLED_SOURCES` - Never use these sources (e.g., "momo")
//!
//! `DISABLED_SOURCES` always takes precedence over `ENABLED_SOURCES`. The same
//! lists can be given in the `[sources]` section of the configuration file.

mod books_com_tw;
mod google_books;
mod markup;
mod momo;
mod registry;
mod sanmin;

pub mod mock;

pub use books_com_tw::BooksComTwSource;
pub use google_books::GoogleBooksSource;
pub use mock::{MockReply, MockSource};
pub use momo::MomoSource;
pub use registry::{SourceCapabilities, SourceRegistry, SourceSelection};
pub use sanmin::SanminSource;

use crate::models::{BookRecord, SourceKind};
use crate::utils::FetchError;
use async_trait::async_trait;

/// The Source trait defines the interface for all metadata adapters.
///
/// # Implementing a New Source
///
/// 1. Create a new struct that implements `Source`
/// 2. Implement `kind`, `id`, `name` and `capabilities`
/// 3. Implement `resolve_by_isbn` and/or `search_by_keyword` to match the
///    declared capabilities
/// 4. Add the source to `SourceRegistry::new()` at its priority position
///
/// A lookup that parses but finds nothing returns `Ok` with a `found == false`
/// record (ISBN) or an empty list (keyword). `Err` is reserved for fetch and
/// parse failures.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which source produced the records
    fn kind(&self) -> SourceKind;

    /// Unique identifier (used in configuration, e.g. "momo")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::ISBN_LOOKUP
    }

    /// Whether this source answers exact ISBN lookups
    fn supports_isbn(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::ISBN_LOOKUP)
    }

    /// Whether this source answers free-text keyword searches
    fn supports_keyword(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::KEYWORD_SEARCH)
    }

    /// Look up one book by ISBN (digits only, already cleaned)
    async fn resolve_by_isbn(&self, _isbn: &str) -> Result<BookRecord, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Search by keyword, returning at most `limit` candidates
    async fn search_by_keyword(
        &self,
        _keyword: &str,
        _limit: usize,
    ) -> Result<Vec<BookRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur inside a source adapter.
///
/// The resolver absorbs all of these; none reach its callers.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// The request never produced a usable response
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The source answered with an anti-automation page
    #[error("Blocked by source: {0}")]
    Blocked(String),

    /// The response could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_capabilities() {
        let caps = SourceCapabilities::ISBN_LOOKUP | SourceCapabilities::KEYWORD_SEARCH;

        assert!(caps.contains(SourceCapabilities::ISBN_LOOKUP));
        assert!(caps.contains(SourceCapabilities::KEYWORD_SEARCH));
        assert!(!caps.contains(SourceCapabilities::WARM_UP));
    }

    #[test]
    fn test_fetch_error_conversion() {
        let err: SourceError = FetchError::Timeout.into();
        assert!(matches!(err, SourceError::Fetch(FetchError::Timeout)));
    }

    #[test]
    fn test_json_error_is_parse_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SourceError = json_err.into();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
