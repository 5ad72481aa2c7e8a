//! Source provider registry.
//!
//! Providers are registered once at startup and looked up by
//! [`SourceType`] during resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::{SourceProvider, SourceType};
use crate::{Error, Result};

/// Registry of source providers.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    providers: HashMap<SourceType, Arc<dyn SourceProvider>>,
}

impl SourceRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    ///
    /// A provider already registered for the same type is replaced.
    pub fn register<P: SourceProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.source_type(), Arc::new(provider));
    }

    /// Register a shared provider.
    pub fn register_arc(&mut self, provider: Arc<dyn SourceProvider>) {
        self.providers.insert(provider.source_type(), provider);
    }

    #[must_use]
    pub fn get(&self, kind: SourceType) -> Option<&Arc<dyn SourceProvider>> {
        self.providers.get(&kind)
    }

    /// Look up a provider, failing when none is registered.
    pub fn require(&self, kind: SourceType) -> Result<&Arc<dyn SourceProvider>> {
        self.get(kind).ok_or_else(|| {
            Error::tool_resolution_with_help(
                format!("no provider registered for source type '{kind}'"),
                format!("Registered types: {}", self.type_list()),
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceProvider>> {
        self.providers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered types, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<SourceType> {
        let mut types: Vec<_> = self.providers.keys().copied().collect();
        types.sort();
        types
    }

    fn type_list(&self) -> String {
        self.types()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("providers", &self.types())
            .finish()
    }
}
