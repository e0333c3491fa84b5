//! # mapier-core
//!
//! Core types, traits, and abstractions for mapier.
//!
//! This crate provides the domain model, the error taxonomy and the port
//! traits that the persistence, provider, search and API crates build on.

pub mod defaults;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod similarity;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, FieldError, ProviderFailure, Result};
pub use geo::{haversine_m, BoundingBox, GeoPoint};
pub use models::*;
pub use similarity::{name_similarity, normalize_name};
pub use traits::*;
