//! # mapier-providers
//!
//! Place provider implementations for mapier.
//!
//! Each provider satisfies [`mapier_core::PlaceProvider`] and owns the
//! normalization of its upstream format into [`mapier_core::Place`]:
//!
//! - [`LocalProvider`]: canonical records in the PostGIS store
//! - [`GooglePlacesProvider`]: Google Places API (New)
//! - [`AccessibilityProvider`]: accessibility.cloud-compatible GeoJSON API
//!
//! [`ProviderRegistry::from_env`] registers whichever providers have
//! credentials configured.

pub mod accessibility;
pub mod google;
mod http;
pub mod local;
pub mod registry;

// Mock provider for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use accessibility::{AccessibilityConfig, AccessibilityProvider};
pub use google::{GoogleConfig, GooglePlacesProvider};
pub use local::LocalProvider;
pub use registry::ProviderRegistry;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockProvider;
