//! # Biblio Resolver
//!
//! Resolves book metadata by ISBN or free-text keyword across a fixed set of
//! sources: regional storefront pages scraped through a disguised HTTP client,
//! and the Google Books API as a structured fallback.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (BookRecord, AdapterOutcome, resolution reports)
//! - [`sources`]: Source adapters behind the [`Source`] trait, plus the registry
//! - [`resolver`]: The ISBN fallback chain and the keyword fan-out
//! - [`utils`]: Disguised fetch client, normalization, ISBN helpers, deduplication
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use biblio_resolver::{config::get_config, Resolver};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::from_config(&get_config())?;
//!
//! let record = resolver.resolve_isbn("978-986-479-166-8").await?;
//! if record.found {
//!     println!("{} / {}", record.title, record.author);
//! }
//!
//! for candidate in resolver.search_keyword("三體").await? {
//!     println!("{} ({})", candidate.title, candidate.source.map(|s| s.to_string()).unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod resolver;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{AdapterOutcome, BookRecord, IsbnResolution, KeywordSearch, SourceKind};
pub use resolver::{Resolver, ResolverError, ResolverSettings};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
