//! Service layer for identity and cache concerns.

pub mod bridge;
pub mod identity_resolver;
pub mod place_cache;

pub use bridge::{clamp_nearby_radius, BridgeLookup};
pub use identity_resolver::{IdentityResolver, ResolverConfig};
pub use place_cache::PlaceCache;
