//! # mapier-search
//!
//! Multi-provider place search for mapier.
//!
//! This crate provides:
//! - Merging of places from different providers that describe the same
//!   real-world place (proximity AND name similarity), with
//!   priority-weighted confidence scoring
//! - Deterministic ranking (confidence, distance, provider priority)
//! - Canonical cache keys independent of parameter order
//! - The [`SearchOrchestrator`]: concurrent fan-out with per-provider
//!   timeouts, partial-failure tolerance and cache-aside reads
//!
//! ## Example
//!
//! ```ignore
//! use mapier_search::{SearchOrchestrator, SearchQuery};
//!
//! let orchestrator = SearchOrchestrator::new(registry, cache);
//! let result = orchestrator
//!     .search(&SearchQuery::near(41.7916, -87.5935).with_query("coffee"))
//!     .await?;
//! for place in result.places {
//!     println!("{} ({:.2})", place.name, place.confidence);
//! }
//! ```

pub mod cache_key;
pub mod dedup;
pub mod orchestrator;
pub mod ranking;

// Re-export core types
pub use mapier_core::*;

pub use cache_key::{autocomplete_key, params_hash, place_key, search_key};
pub use dedup::{is_same_place, merge_places, merged_confidence, priority_weight, Candidate, MergeConfig};
pub use orchestrator::{OrchestratorConfig, SearchOrchestrator};
pub use ranking::rank;
