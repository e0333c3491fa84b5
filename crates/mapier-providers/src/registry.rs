//! The set of enabled place providers.

use std::sync::Arc;

use tracing::info;

use mapier_core::{PlaceProvider, Result};
use mapier_db::Database;

use crate::accessibility::AccessibilityProvider;
use crate::google::GooglePlacesProvider;
use crate::local::LocalProvider;

/// Enabled providers, kept in priority order (most trusted first).
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn PlaceProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from environment.
    ///
    /// The local provider is registered unless `LOCAL_PROVIDER_ENABLED` is
    /// `false`; remote providers are registered only when their
    /// credentials are configured.
    pub fn from_env(db: Database) -> Result<Self> {
        let mut registry = Self::new();

        let local_enabled = std::env::var("LOCAL_PROVIDER_ENABLED")
            .map(|v| !v.eq_ignore_ascii_case("false") && v != "0")
            .unwrap_or(true);
        if local_enabled {
            registry.register(Arc::new(LocalProvider::from_env(db)));
        }

        match GooglePlacesProvider::from_env()? {
            Some(google) => registry.register(Arc::new(google)),
            None => info!(
                subsystem = "providers",
                provider = "google",
                "GOOGLE_PLACES_API_KEY not set, provider disabled"
            ),
        }

        match AccessibilityProvider::from_env()? {
            Some(accessibility) => registry.register(Arc::new(accessibility)),
            None => info!(
                subsystem = "providers",
                provider = "accessibility",
                "ACCESSIBILITY_API_URL/ACCESSIBILITY_API_TOKEN not set, provider disabled"
            ),
        }

        Ok(registry)
    }

    /// Register a provider, replacing any provider with the same name.
    pub fn register(&mut self, provider: Arc<dyn PlaceProvider>) {
        info!(
            subsystem = "providers",
            provider = provider.name(),
            priority = provider.priority(),
            timeout_ms = provider.timeout().map(|t| t.as_millis() as u64),
            autocomplete = provider.supports_autocomplete(),
            "Registering place provider"
        );
        self.providers.retain(|p| p.name() != provider.name());
        self.providers.push(provider);
        self.providers
            .sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));
    }

    /// Builder-style [`ProviderRegistry::register`].
    pub fn with(mut self, provider: Arc<dyn PlaceProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Enabled providers, most trusted first.
    pub fn providers(&self) -> &[Arc<dyn PlaceProvider>] {
        &self.providers
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PlaceProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Names of enabled providers, most trusted first.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    #[test]
    fn test_providers_sorted_by_priority() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(MockProvider::new("accessibility", 3)))
            .with(Arc::new(MockProvider::new("local", 1)))
            .with(Arc::new(MockProvider::new("google", 2)));
        assert_eq!(registry.names(), vec!["local", "google", "accessibility"]);
        assert_eq!(registry.get("google").map(|p| p.priority()), Some(2));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(MockProvider::new("google", 2)))
            .with(Arc::new(MockProvider::new("google", 5)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("google").map(|p| p.priority()), Some(5));
    }
}
