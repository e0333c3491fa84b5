//! Structured logging schema and field name constants for mapier.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query the same field across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, absorbed failure (provider timeout, cache down, lost race) |
//! | INFO  | Lifecycle events, resolution outcomes |
//! | DEBUG | Decision points: cache hit/miss, merge counts, chosen match |
//! | TRACE | Per-item iteration (individual candidates, merged members) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "search", "db", "providers", "identity", "cache"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "merge", "google", "resolver", "bridge", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "resolve", "sync_pli", "bridge", "find_nearby"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Canonical place id being operated on.
pub const PLACE_ID: &str = "place_id";

/// Provider name ("local", "google", "accessibility").
pub const PROVIDER: &str = "provider";

/// Client platform ("google", "apple") or source platform ("ios", "android").
pub const PLATFORM: &str = "platform";

/// Cache key being read or written.
pub const CACHE_KEY: &str = "cache_key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidate places before merging.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of providers that answered successfully.
pub const PROVIDERS_OK: &str = "providers_ok";

/// Number of providers that failed or timed out.
pub const PROVIDERS_FAILED: &str = "providers_failed";

/// Distance in meters.
pub const DISTANCE_M: &str = "distance_m";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Resolution method ("exact_identifier", "spatial_match", "created_new").
pub const METHOD: &str = "method";

/// Confidence attached to a result.
pub const CONFIDENCE: &str = "confidence";

/// Whether a result was served from cache.
pub const CACHED: &str = "cached";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
