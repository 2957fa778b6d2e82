//! Ranking of candidate suggestions.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::Suggestion;

/// Default number of suggestions returned to the caller.
pub const DEFAULT_LIMIT: usize = 3;

/// Best-first comparison.
///
/// Coverage dominates: fewer unassigned reservations always wins. Then
/// shorter total distance, fuller buses, fewer buses, and finally the fleet
/// composition and strategy so the order is total.
pub fn compare(a: &Suggestion, b: &Suggestion) -> Ordering {
    a.unassigned
        .len()
        .cmp(&b.unassigned.len())
        .then_with(|| a.total_km.total_cmp(&b.total_km))
        .then_with(|| b.average_occupancy.total_cmp(&a.average_occupancy))
        .then_with(|| a.total_buses.cmp(&b.total_buses))
        .then_with(|| a.combination.cmp(&b.combination))
        .then_with(|| a.strategy.cmp(&b.strategy))
}

/// Sorts best first, drops suggestions that seat the same parties together
/// as a better one, and keeps at most `limit`.
pub fn rank(mut suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    suggestions.sort_by(compare);

    let mut seen = HashSet::new();
    suggestions.retain(|suggestion| {
        let key: Vec<Vec<String>> = suggestion
            .partition_key()
            .into_iter()
            .map(|group| group.into_iter().map(str::to_string).collect())
            .collect();
        seen.insert(key)
    });
    suggestions.truncate(limit);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bus, Point, Reservation, Strategy};

    fn reservation(id: &str, passengers: u32) -> Reservation {
        Reservation::new(id, passengers, Point::new(1, "p", Some(6.2), Some(-75.5)))
    }

    fn suggestion(strategy: Strategy, groups: &[&[&str]], unassigned: &[&str], km: f64) -> Suggestion {
        let buses: Vec<Bus> = groups
            .iter()
            .enumerate()
            .map(|(i, ids)| Bus {
                id: (i + 1).to_string(),
                capacity: 20,
                occupied: 2 * ids.len() as u32,
                reservations: ids.iter().map(|id| reservation(id, 2)).collect(),
                route_km: km / groups.len() as f64,
                guide: None,
                missing_coordinates: Vec::new(),
            })
            .collect();
        let occupied: u32 = buses.iter().map(|b| b.occupied).sum();
        let capacity = 20 * buses.len() as u32;
        Suggestion {
            combination: vec![20; buses.len()],
            total_buses: buses.len(),
            buses,
            total_km: km,
            average_occupancy: if capacity == 0 { 0.0 } else { f64::from(occupied) / f64::from(capacity) },
            unassigned: unassigned.iter().map(|id| reservation(id, 2)).collect(),
            strategy,
            total_capacity: capacity,
        }
    }

    #[test]
    fn test_coverage_beats_distance() {
        let short = suggestion(Strategy::MinimumFleet, &[&["a"]], &["b"], 1.0);
        let long = suggestion(Strategy::BalancedOccupancy, &[&["a", "b"]], &[], 50.0);
        let ranked = rank(vec![short, long], DEFAULT_LIMIT);
        assert_eq!(ranked[0].strategy, Strategy::BalancedOccupancy);
    }

    #[test]
    fn test_distance_then_occupancy_then_bus_count() {
        let far = suggestion(Strategy::MinimumFleet, &[&["a", "b"]], &[], 12.0);
        let near = suggestion(Strategy::GeographyFirst, &[&["a"], &["b"]], &[], 10.0);
        assert_eq!(compare(&near, &far), Ordering::Less);

        let full = suggestion(Strategy::MinimumFleet, &[&["a", "b"]], &[], 10.0);
        assert_eq!(compare(&full, &near), Ordering::Less);
    }

    #[test]
    fn test_rank_is_deterministic_regardless_of_input_order() {
        let a = suggestion(Strategy::MinimumFleet, &[&["a", "b", "c"]], &[], 10.0);
        let b = suggestion(Strategy::BalancedOccupancy, &[&["a"], &["b", "c"]], &[], 10.0);
        let c = suggestion(Strategy::GeographyFirst, &[&["a", "b"], &["c"]], &[], 10.0);
        let forward = rank(vec![a.clone(), b.clone(), c.clone()], DEFAULT_LIMIT);
        let backward = rank(vec![c, b, a], DEFAULT_LIMIT);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_equal_partitions_are_deduplicated() {
        let better = suggestion(Strategy::MinimumFleet, &[&["a", "b"], &["c"]], &[], 8.0);
        let worse = suggestion(Strategy::GeographyFirst, &[&["c"], &["b", "a"]], &[], 9.0);
        let ranked = rank(vec![worse, better], DEFAULT_LIMIT);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].strategy, Strategy::MinimumFleet);
    }

    #[test]
    fn test_limit_applies_after_dedup() {
        let all: Vec<Suggestion> = [
            suggestion(Strategy::MinimumFleet, &[&["a", "b", "c", "d"]], &[], 4.0),
            suggestion(Strategy::MinimumFleet, &[&["a"], &["b", "c", "d"]], &[], 5.0),
            suggestion(Strategy::MinimumFleet, &[&["a", "b"], &["c", "d"]], &[], 6.0),
            suggestion(Strategy::MinimumFleet, &[&["a", "b", "c"], &["d"]], &[], 7.0),
        ]
        .into_iter()
        .collect();
        let ranked = rank(all, 3);
        let km: Vec<f64> = ranked.iter().map(|s| s.total_km).collect();
        assert_eq!(km, vec![4.0, 5.0, 6.0]);
    }
}
