//! Registry for managing metadata source adapters.

use std::sync::Arc;

use super::{
    books_com_tw::BooksComTwSource, google_books::GoogleBooksSource, momo::MomoSource,
    sanmin::SanminSource, Source,
};
use crate::utils::FetchClient;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const ISBN_LOOKUP = 1 << 0;
        const KEYWORD_SEARCH = 1 << 1;
        /// ISBN lookups follow the first result to its detail page
        const DETAIL_PAGE = 1 << 2;
        /// A warm-up request establishes a cookie session first
        const WARM_UP = 1 << 3;
    }
}

/// Which registered sources a caller wants to use.
///
/// `disabled` always wins over `enabled`; `enabled == None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSelection {
    pub enabled: Option<Vec<String>>,
    pub disabled: Vec<String>,
}

impl SourceSelection {
    /// Build a selection from comma-separated id lists
    pub fn from_lists(enabled: Option<&str>, disabled: Option<&str>) -> Self {
        Self {
            enabled: enabled.map(split_ids).filter(|ids| !ids.is_empty()),
            disabled: disabled.map(split_ids).unwrap_or_default(),
        }
    }

    /// Read `BIBLIO_RESOLVER_ENABLED_SOURCES` / `BIBLIO_RESOLVER_DISABLED_SOURCES`
    pub fn from_env() -> Self {
        let enabled = std::env::var("BIBLIO_RESOLVER_ENABLED_SOURCES").ok();
        let disabled = std::env::var("BIBLIO_RESOLVER_DISABLED_SOURCES").ok();
        Self::from_lists(enabled.as_deref(), disabled.as_deref())
    }

    /// Combine with another selection; the other's lists take precedence when set
    pub fn overlay(mut self, other: SourceSelection) -> Self {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        self.disabled.extend(other.disabled);
        self
    }

    pub fn allows(&self, id: &str) -> bool {
        if self.disabled.iter().any(|d| d == id) {
            return false;
        }
        match &self.enabled {
            Some(enabled) => enabled.iter().any(|e| e == id),
            None => true,
        }
    }
}

fn split_ids(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Ordered registry of source adapters.
///
/// Registration order is ISBN priority order: the fallback chain consults
/// sources front to back.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create a registry with every built-in source, in priority order
    pub fn new(client: FetchClient) -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(MomoSource::new(client.clone())));
        registry.register(Arc::new(SanminSource::new(client.clone())));
        registry.register(Arc::new(BooksComTwSource::new(client.clone())));
        registry.register(Arc::new(GoogleBooksSource::new(client)));

        registry
    }

    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source at the lowest priority.
    ///
    /// A source whose id is already registered replaces the old one in place.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(index) => self.sources[index] = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get all registered sources, in priority order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs, in priority order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .cloned()
            .collect()
    }

    /// The ISBN fallback chain, highest priority first
    pub fn isbn_chain(&self) -> Vec<Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::ISBN_LOOKUP)
    }

    /// Sources taking part in the keyword fan-out
    pub fn keyword_sources(&self) -> Vec<Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::KEYWORD_SEARCH)
    }

    /// Keep only the sources the selection allows
    pub fn apply_selection(&mut self, selection: &SourceSelection) {
        self.sources.retain(|s| selection.allows(s.id()));
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;
    use crate::utils::FetchSettings;

    fn registry() -> SourceRegistry {
        SourceRegistry::new(FetchClient::new(FetchSettings::deterministic()).unwrap())
    }

    #[test]
    fn test_registry_priority_order() {
        let registry = registry();

        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["momo", "sanmin", "books_com_tw", "google_books"]
        );
        let chain: Vec<String> = registry
            .isbn_chain()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(chain, vec!["momo", "sanmin", "books_com_tw", "google_books"]);
        assert_eq!(registry.keyword_sources().len(), 4);
    }

    #[test]
    fn test_get_source() {
        let registry = registry();

        let sanmin = registry.get("sanmin");
        assert!(sanmin.is_some());
        assert_eq!(sanmin.unwrap().id(), "sanmin");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = SourceRegistry::empty();
        registry.register(Arc::new(MockSource::new("a")));
        registry.register(Arc::new(MockSource::new("b")));
        registry.register(Arc::new(MockSource::new("a").keyword_only()));

        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(registry.isbn_chain().len(), 1);
    }

    #[test]
    fn test_capabilities() {
        let registry = registry();

        let books = registry.get("books_com_tw").unwrap();
        assert!(books.capabilities().contains(SourceCapabilities::WARM_UP));

        let momo = registry.get("momo").unwrap();
        assert!(momo.capabilities().contains(SourceCapabilities::DETAIL_PAGE));
        assert!(momo.supports_isbn());
        assert!(momo.supports_keyword());
    }

    #[test]
    fn test_selection_disabled_wins() {
        let selection = SourceSelection::from_lists(Some("momo, Sanmin"), Some("sanmin"));
        assert!(selection.allows("momo"));
        assert!(!selection.allows("sanmin"));
        assert!(!selection.allows("google_books"));

        let mut registry = registry();
        registry.apply_selection(&selection);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["momo"]);
    }

    #[test]
    fn test_selection_defaults_to_all() {
        let selection = SourceSelection::from_lists(Some(" , "), None);
        assert!(selection.enabled.is_none());
        assert!(selection.allows("google_books"));
    }

    #[test]
    fn test_selection_overlay() {
        let file = SourceSelection::from_lists(Some("momo,sanmin"), Some("momo"));
        let env = SourceSelection::from_lists(Some("google_books"), Some("sanmin"));
        let merged = file.overlay(env);

        assert_eq!(merged.enabled, Some(vec!["google_books".to_string()]));
        assert!(!merged.allows("momo"));
        assert!(merged.allows("google_books"));
    }
}
