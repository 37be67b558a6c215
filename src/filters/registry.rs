//! Filter registry for managing available node kinds.

use crate::core::filter::{Filter, FilterMetadata, FilterRole};
use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};

/// Factory function for creating filter instances.
pub type FilterFactory = Arc<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Registry entry containing metadata and factory.
///
/// This is the node descriptor a lookup returns: pad layout and option
/// schema without creating an instance.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Factory function to create instances.
    pub factory: FilterFactory,
    /// Cached metadata.
    pub metadata: FilterMetadata,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Registry for all available node kinds.
///
/// Built once, then shared read-only. Graphs receive it as an
/// `Arc<FilterRegistry>` rather than reaching for global state.
pub struct FilterRegistry {
    /// Kinds indexed by name, in registration order.
    filters: IndexMap<String, RegistryEntry>,
}

static SHARED: OnceLock<Arc<FilterRegistry>> = OnceLock::new();

impl FilterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            filters: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::filters::builtin::register_all(&mut registry);
        registry
    }

    /// The process-wide registry of built-in kinds.
    pub fn shared() -> Arc<FilterRegistry> {
        SHARED
            .get_or_init(|| Arc::new(FilterRegistry::with_builtins()))
            .clone()
    }

    /// Register a node kind. A kind with the same name is replaced.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    {
        // Create a temporary instance to get metadata
        let metadata = factory().metadata();
        let name = metadata.name.clone();

        let entry = RegistryEntry {
            factory: Arc::new(factory),
            metadata,
        };

        if self.filters.insert(name.clone(), entry).is_some() {
            log::debug!("replaced filter kind '{}'", name);
        }
    }

    /// Look up a kind by name.
    pub fn lookup(&self, name: &str) -> Option<&RegistryEntry> {
        self.filters.get(name)
    }

    /// Create a new instance of a kind.
    pub fn create(&self, name: &str) -> Option<Box<dyn Filter>> {
        self.filters.get(name).map(|e| (e.factory)())
    }

    /// Get metadata for a kind without creating an instance.
    pub fn get_metadata(&self, name: &str) -> Option<&FilterMetadata> {
        self.filters.get(name).map(|e| &e.metadata)
    }

    /// Check if a kind is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Get all registered kind names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|s| s.as_str())
    }

    /// Get all registered kinds.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get kinds with the given role.
    pub fn names_by_role(&self, role: FilterRole) -> Vec<&str> {
        self.filters
            .iter()
            .filter(|(_, e)| e.metadata.role == role)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Search kinds by name or description.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.filters
            .iter()
            .filter(|(name, entry)| {
                name.to_lowercase().contains(&query)
                    || entry.metadata.description.to_lowercase().contains(&query)
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Get the total number of registered kinds.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Builder for creating a customized registry.
pub struct RegistryBuilder {
    registry: FilterRegistry,
    include_builtins: bool,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: FilterRegistry::new(),
            include_builtins: true,
        }
    }

    /// Include or exclude built-in kinds.
    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    /// Register a custom kind.
    pub fn register<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    {
        self.registry.register(factory);
        self
    }

    /// Build the registry, ready to be shared.
    pub fn build(self) -> Arc<FilterRegistry> {
        let mut registry = FilterRegistry::new();
        if self.include_builtins {
            crate::filters::builtin::register_all(&mut registry);
        }
        // Custom kinds win over built-ins of the same name.
        for (_, entry) in self.registry.filters {
            registry.filters.insert(entry.metadata.name.clone(), entry);
        }
        Arc::new(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::Anull;

    #[test]
    fn test_register_and_create() {
        let mut registry = FilterRegistry::new();
        registry.register(|| Box::new(Anull));

        assert!(registry.contains("anull"));
        assert!(registry.create("anull").is_some());
        assert!(registry.create("nonexistent").is_none());
    }

    #[test]
    fn test_lookup_exposes_layout_and_schema() {
        let registry = FilterRegistry::with_builtins();

        let entry = registry.lookup("volume").unwrap();
        assert_eq!(entry.metadata.inputs.len(), 1);
        assert_eq!(entry.metadata.outputs.len(), 1);
        assert!(entry.metadata.get_option("volume").is_some());
    }

    #[test]
    fn test_roles() {
        let registry = FilterRegistry::with_builtins();
        assert_eq!(registry.names_by_role(FilterRole::Source), vec!["buffer"]);
        assert_eq!(registry.names_by_role(FilterRole::Sink), vec!["buffersink"]);
    }

    #[test]
    fn test_search() {
        let registry = FilterRegistry::with_builtins();
        assert!(registry.search("split").contains(&"asplit"));
        assert!(registry.search("nonexistent").is_empty());
    }

    #[test]
    fn test_shared_registry_is_reused() {
        let a = FilterRegistry::shared();
        let b = FilterRegistry::shared();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.contains("buffersink"));
    }

    #[test]
    fn test_builder_without_builtins() {
        let registry = RegistryBuilder::new()
            .with_builtins(false)
            .register(|| Box::new(Anull))
            .build();

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("buffer"));
    }
}
