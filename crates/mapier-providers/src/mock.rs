//! Scriptable provider for deterministic tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mapier_providers::mock::MockProvider;
//!
//! let google = MockProvider::new("google", 2)
//!     .with_places(vec![place])
//!     .with_delay(Duration::from_secs(5))
//!     .with_timeout(Duration::from_secs(3));
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mapier_core::{
    AutocompleteQuery, AutocompleteSuggestion, Error, Place, PlaceProvider, Result, SearchQuery,
};

/// Mock place provider.
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    priority: u8,
    timeout: Option<Duration>,
    places: Vec<Place>,
    suggestions: Option<Vec<AutocompleteSuggestion>>,
    delay: Option<Duration>,
    failure: Option<String>,
    healthy: bool,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: &'static str,
    pub input: String,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            priority,
            timeout: None,
            places: Vec::new(),
            suggestions: None,
            delay: None,
            failure: None,
            healthy: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Places returned by `search` and looked up by `get_by_id`.
    pub fn with_places(mut self, places: Vec<Place>) -> Self {
        self.places = places;
        self
    }

    /// Enable autocomplete with a fixed suggestion list.
    pub fn with_suggestions(mut self, suggestions: Vec<AutocompleteSuggestion>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    /// Sleep before answering (uses tokio time, so paused clocks apply).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail every call with `ProviderUnavailable`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls to `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.operation == operation).count()
    }

    async fn answer(&self, operation: &'static str, input: String) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall { operation, input });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(reason) => Err(Error::ProviderUnavailable {
                provider: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlaceProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>> {
        self.answer("search", query.text().unwrap_or_default().to_string())
            .await?;
        let origin = query.location.point();
        Ok(self
            .places
            .iter()
            .cloned()
            .map(|mut p| {
                p.measure_from(&origin);
                p
            })
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Place>> {
        self.answer("get_by_id", id.to_string()).await?;
        Ok(self.places.iter().find(|p| p.id == id).cloned())
    }

    fn supports_autocomplete(&self) -> bool {
        self.suggestions.is_some()
    }

    async fn autocomplete(&self, query: &AutocompleteQuery) -> Result<Vec<AutocompleteSuggestion>> {
        self.answer("autocomplete", query.input.clone()).await?;
        Ok(self.suggestions.clone().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<bool> {
        self.answer("health_check", String::new()).await?;
        Ok(self.healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapier_core::GeoPoint;

    #[tokio::test]
    async fn test_search_records_calls_and_measures_distance() {
        let place = Place::new("p1", "Cafe", GeoPoint::new(41.0, -87.0), 0.9, "mock");
        let provider = MockProvider::new("mock", 1).with_places(vec![place]);

        let results = provider
            .search(&SearchQuery::near(41.0, -87.0).with_query("cafe"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].distance_m, Some(0.0));
        assert_eq!(provider.call_count("search"), 1);
        assert_eq!(provider.calls()[0].input, "cafe");
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = MockProvider::new("google", 2).failing("503");
        let err = provider.search(&SearchQuery::near(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_uses_tokio_clock() {
        let provider = MockProvider::new("slow", 2).with_delay(Duration::from_secs(10));
        let start = tokio::time::Instant::now();
        provider.get_by_id("x").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
