//! Merging of overlapping places and confidence scoring.
//!
//! Two places describe the same real-world place when they are closer
//! than the proximity threshold AND their normalized names are more
//! similar than the name threshold. Requiring both keeps distinct
//! businesses that share a building apart.
//!
//! Grouping is greedy in priority order: each candidate joins the first
//! group whose representative it matches, otherwise it founds a new group.
//! Representatives never change after a group is founded, so no two
//! surviving places satisfy both conditions.

use tracing::trace;

use mapier_core::{defaults, normalize_name, similarity::normalized_similarity, Place};

/// Thresholds for [`merge_places`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// Places closer than this (meters) may merge.
    pub proximity_m: f64,
    /// Name similarity that must be exceeded to merge.
    pub name_threshold: f64,
    /// Confidence added once when two or more providers agree.
    pub corroboration_boost: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            proximity_m: defaults::MERGE_PROXIMITY_M,
            name_threshold: defaults::MERGE_NAME_THRESHOLD,
            corroboration_boost: defaults::CORROBORATION_BOOST,
        }
    }
}

impl MergeConfig {
    /// Read `MERGE_PROXIMITY_METERS` and `MERGE_NAME_THRESHOLD`.
    pub fn from_env() -> Self {
        let read = |key: &str, default: f64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(default)
        };
        Self {
            proximity_m: read("MERGE_PROXIMITY_METERS", defaults::MERGE_PROXIMITY_M),
            name_threshold: read("MERGE_NAME_THRESHOLD", defaults::MERGE_NAME_THRESHOLD),
            ..Self::default()
        }
    }
}

/// A place tagged with its provider's priority.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub place: Place,
    pub priority: u8,
}

impl Candidate {
    pub fn new(place: Place, priority: u8) -> Self {
        Self { place, priority }
    }
}

/// Weight applied to a provider's confidence: 1.0 for priority 1, minus
/// 0.05 per step, never below 0.75.
pub fn priority_weight(priority: u8) -> f64 {
    let steps = f64::from(priority.saturating_sub(1));
    (1.0 - defaults::PRIORITY_WEIGHT_STEP * steps).max(defaults::PRIORITY_WEIGHT_FLOOR)
}

/// True when `a` and `b` satisfy both merge conditions.
pub fn is_same_place(a: &Place, b: &Place, config: &MergeConfig) -> bool {
    same_place(
        a,
        &normalize_name(&a.name),
        b,
        &normalize_name(&b.name),
        config,
    )
}

fn same_place(a: &Place, a_name: &str, b: &Place, b_name: &str, config: &MergeConfig) -> bool {
    a.location.distance_to(&b.location) < config.proximity_m
        && normalized_similarity(a_name, b_name) > config.name_threshold
}

struct Group {
    normalized_name: String,
    representative: Candidate,
    others: Vec<Candidate>,
}

/// Merge candidates describing the same place.
///
/// Each output keeps its representative's priority so ranking can break
/// ties on it. Output order follows group creation (priority order) and
/// is not a ranking.
pub fn merge_places(mut candidates: Vec<Candidate>, config: &MergeConfig) -> Vec<Candidate> {
    // Stable: equal priorities keep provider answer order.
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.place.provider.cmp(&b.place.provider))
    });

    let mut groups: Vec<Group> = Vec::new();
    for candidate in candidates {
        let name = normalize_name(&candidate.place.name);
        let existing = groups.iter_mut().find(|g| {
            same_place(
                &g.representative.place,
                &g.normalized_name,
                &candidate.place,
                &name,
                config,
            )
        });
        match existing {
            Some(group) => {
                trace!(
                    subsystem = "search",
                    component = "merge",
                    representative = %group.representative.place.id,
                    member = %candidate.place.id,
                    "Merging place into group"
                );
                group.others.push(candidate);
            }
            None => groups.push(Group {
                normalized_name: name,
                representative: candidate,
                others: Vec::new(),
            }),
        }
    }

    groups.into_iter().map(|g| collapse(g, config)).collect()
}

/// Fold a group into its representative.
fn collapse(group: Group, config: &MergeConfig) -> Candidate {
    let Group {
        representative,
        others,
        ..
    } = group;
    let confidence = merged_confidence(std::iter::once(&representative).chain(&others), config);

    let Candidate {
        place: mut merged,
        priority,
    } = representative;
    let mut sources = std::mem::take(&mut merged.sources);
    if !sources.contains(&merged.provider) {
        sources.insert(0, merged.provider.clone());
    }
    for member in &others {
        backfill(&mut merged, &member.place);
        for source in std::iter::once(&member.place.provider).chain(&member.place.sources) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
    }

    merged.sources = sources;
    merged.confidence = confidence;
    Candidate::new(merged, priority)
}

/// Priority-weighted maximum of member confidences, boosted once when two
/// or more distinct providers contributed, capped at 1.0.
pub fn merged_confidence<'a>(
    members: impl IntoIterator<Item = &'a Candidate>,
    config: &MergeConfig,
) -> f64 {
    let mut best = 0.0_f64;
    let mut providers: Vec<&str> = Vec::new();
    for member in members {
        best = best.max(member.place.confidence * priority_weight(member.priority));
        if !providers.contains(&member.place.provider.as_str()) {
            providers.push(&member.place.provider);
        }
    }

    let boost = if providers.len() >= 2 {
        config.corroboration_boost
    } else {
        0.0
    };
    (best + boost).min(1.0)
}

/// Fill fields `target` lacks from `other`; present values win.
fn backfill(target: &mut Place, other: &Place) {
    if target.category.primary.is_none() {
        target.category.primary = other.category.primary.clone();
    }
    if target.category.secondary.is_empty() {
        target.category.secondary = other.category.secondary.clone();
    }
    fill_vec(&mut target.socials, &other.socials);
    fill_vec(&mut target.websites, &other.websites);
    fill_vec(&mut target.phones, &other.phones);
    fill_vec(&mut target.emails, &other.emails);
    fill_opt(&mut target.brand, &other.brand);
    fill_opt(&mut target.operating_status, &other.operating_status);
    fill_opt(&mut target.address, &other.address);
    fill_opt(&mut target.primary_source, &other.primary_source);
    fill_opt(&mut target.google_place_id, &other.google_place_id);
    fill_opt(&mut target.apple_place_id, &other.apple_place_id);
    fill_opt(&mut target.distance_m, &other.distance_m);
    target.attributes.backfill_from(&other.attributes);
}

fn fill_vec(target: &mut Vec<String>, other: &[String]) {
    if target.is_empty() {
        target.extend_from_slice(other);
    }
}

fn fill_opt<T: Clone>(target: &mut Option<T>, other: &Option<T>) {
    if target.is_none() {
        target.clone_from(other);
    }
}
