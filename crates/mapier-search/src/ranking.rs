//! Deterministic result ordering.

use std::cmp::Ordering;

use crate::dedup::Candidate;

/// Total order over merged places: confidence descending, then distance
/// ascending (unknown distances last), then provider priority, then id.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    b.place
        .confidence
        .total_cmp(&a.place.confidence)
        .then_with(|| compare_distance(a.place.distance_m, b.place.distance_m))
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.place.id.cmp(&b.place.id))
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort merged places into result order.
pub fn rank(places: &mut [Candidate]) {
    places.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapier_core::{GeoPoint, Place};

    fn candidate(id: &str, confidence: f64, distance: Option<f64>, priority: u8) -> Candidate {
        let mut p = Place::new(id, id, GeoPoint::new(0.0, 0.0), confidence, "p");
        p.distance_m = distance;
        Candidate::new(p, priority)
    }

    fn ids(places: &[Candidate]) -> Vec<&str> {
        places.iter().map(|c| c.place.id.as_str()).collect()
    }

    #[test]
    fn test_confidence_first() {
        let mut v = vec![
            candidate("low", 0.5, Some(1.0), 1),
            candidate("high", 0.9, Some(500.0), 3),
        ];
        rank(&mut v);
        assert_eq!(ids(&v), vec!["high", "low"]);
    }

    #[test]
    fn test_distance_breaks_confidence_ties() {
        let mut v = vec![
            candidate("far", 0.8, Some(300.0), 1),
            candidate("unknown", 0.8, None, 1),
            candidate("near", 0.8, Some(10.0), 2),
        ];
        rank(&mut v);
        assert_eq!(ids(&v), vec!["near", "far", "unknown"]);
    }

    #[test]
    fn test_priority_then_id_break_remaining_ties() {
        let mut v = vec![
            candidate("b", 0.8, Some(10.0), 2),
            candidate("c", 0.8, Some(10.0), 1),
            candidate("a", 0.8, Some(10.0), 2),
        ];
        rank(&mut v);
        assert_eq!(ids(&v), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ranking_is_independent_of_input_order() {
        let base = vec![
            candidate("a", 0.7, Some(50.0), 2),
            candidate("b", 0.9, None, 3),
            candidate("c", 0.7, Some(50.0), 1),
            candidate("d", 0.7, Some(20.0), 3),
        ];
        let mut forward = base.clone();
        let mut reversed: Vec<_> = base.into_iter().rev().collect();
        rank(&mut forward);
        rank(&mut reversed);
        assert_eq!(ids(&forward), ids(&reversed));
    }
}
