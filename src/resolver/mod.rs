//! Resolution orchestrator.
//!
//! Two strategies over the registered sources:
//!
//! - ISBN lookups walk the fallback chain one source at a time and stop at the
//!   first match ([`chain`])
//! - keyword searches fan out to every keyword source at once, bounded by a
//!   worker limit, a per-task timeout and an overall ceiling ([`fanout`])
//!
//! Adapter failures never surface here as errors. The only errors are
//! [`ResolverError`]s for unusable input or configuration.

mod chain;
mod fanout;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ResolverConfig;
use crate::models::{BookRecord, IsbnResolution, KeywordSearch, LookupMode};
use crate::sources::{SourceRegistry, SourceSelection};
use crate::utils::{isbn, FetchClient};

/// Errors surfaced to resolver callers
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("No {mode} sources are configured")]
    NoSources { mode: LookupMode },

    #[error("Worker pool unavailable: {0}")]
    PoolUnavailable(String),

    #[error("Empty query")]
    EmptyQuery,
}

/// Limits for the ISBN chain
#[derive(Debug, Clone)]
pub struct ChainSettings {
    /// Upper bound on one source's whole lookup, detail pages included
    pub step_timeout: Duration,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(45),
        }
    }
}

/// Limits for the keyword fan-out
#[derive(Debug, Clone)]
pub struct FanoutSettings {
    pub max_workers: usize,
    pub task_timeout: Duration,
    pub overall_ceiling: Duration,
    /// Candidates requested from each source
    pub per_source_limit: usize,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout: Duration::from_millis(8000),
            overall_ceiling: Duration::from_millis(10_000),
            per_source_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverSettings {
    pub chain: ChainSettings,
    pub fanout: FanoutSettings,
}

/// Resolves ISBNs and keywords against a registry of sources.
///
/// Cheap to clone; holds no per-request state, so one instance serves any
/// number of concurrent calls.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<SourceRegistry>,
    settings: Arc<ResolverSettings>,
}

impl Resolver {
    pub fn new(registry: SourceRegistry, settings: ResolverSettings) -> Result<Self, ResolverError> {
        if registry.is_empty() {
            return Err(ResolverError::NoSources {
                mode: LookupMode::Exact,
            });
        }
        fanout::validate(&settings.fanout)?;

        Ok(Self {
            registry: Arc::new(registry),
            settings: Arc::new(settings),
        })
    }

    /// Build the fetch client, the built-in sources and the limits from one
    /// configuration.
    ///
    /// Source selection from the environment is applied on top of the file's.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let client = FetchClient::new(config.fetch_settings())
            .map_err(|e| ResolverError::PoolUnavailable(e.to_string()))?;

        let mut registry = SourceRegistry::new(client);
        let selection = config.source_selection().overlay(SourceSelection::from_env());
        registry.apply_selection(&selection);

        Self::new(registry, config.resolver_settings())
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve one ISBN to a single record.
    ///
    /// Returns a `found == false` record when every source came up empty.
    pub async fn resolve_isbn(&self, raw_isbn: &str) -> Result<BookRecord, ResolverError> {
        Ok(self.resolve_isbn_traced(raw_isbn).await?.into_record())
    }

    /// Resolve one ISBN, reporting every source consulted
    pub async fn resolve_isbn_traced(&self, raw_isbn: &str) -> Result<IsbnResolution, ResolverError> {
        let isbn = isbn::clean(raw_isbn);
        if isbn.is_empty() {
            return Err(ResolverError::EmptyQuery);
        }

        let sources = self.registry.isbn_chain();
        if sources.is_empty() {
            return Err(ResolverError::NoSources {
                mode: LookupMode::Exact,
            });
        }

        Ok(chain::run(&sources, &isbn, &self.settings.chain).await)
    }

    /// Search every keyword source; candidates come back in completion order
    pub async fn search_keyword(&self, keyword: &str) -> Result<Vec<BookRecord>, ResolverError> {
        Ok(self.search_keyword_traced(keyword).await?.records)
    }

    /// Search every keyword source, reporting each source's outcome
    pub async fn search_keyword_traced(&self, keyword: &str) -> Result<KeywordSearch, ResolverError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ResolverError::EmptyQuery);
        }

        let sources = self.registry.keyword_sources();
        if sources.is_empty() {
            return Err(ResolverError::NoSources {
                mode: LookupMode::Fuzzy,
            });
        }

        fanout::run(sources, keyword, &self.settings.fanout).await
    }
}
