//! HTTP handlers for mapier-api.

pub mod places;
pub mod search;
pub mod system;
