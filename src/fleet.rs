//! Fleet composition proposals.
//!
//! Automatic mode proposes a handful of materially different fleets so the
//! ranker has real alternatives: the fewest large buses, a fleet tuned to an
//! occupancy band, and a fleet sized zone by zone after grouping pickup
//! points geographically. Assisted mode validates the operator's fleet.

use tracing::debug;

use crate::config::PlannerConfig;
use crate::error::PlanningError;
use crate::haversine::haversine_km;
use crate::model::{FleetComposition, Strategy};
use crate::pool::ReservationPool;

/// What the fleet has to carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    pub total_passengers: u32,
    /// Passenger count of every reservation; parties are never split.
    pub parties: Vec<u32>,
    /// Passengers per geographic zone. Reservations without coordinates
    /// share one extra zone.
    pub zone_loads: Vec<u32>,
}

impl Demand {
    pub fn from_pool(pool: &ReservationPool, radius_km: f64, min_points: usize) -> Self {
        let reservations = pool.reservations();
        let located: Vec<(usize, (f64, f64))> = reservations
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.coords().map(|coords| (i, coords)))
            .collect();
        let coords: Vec<(f64, f64)> = located.iter().map(|(_, c)| *c).collect();

        let mut zone_loads: Vec<u32> = zones(&coords, radius_km, min_points)
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .map(|m| reservations[located[m].0].passengers)
                    .sum()
            })
            .collect();

        let unlocated: u32 = reservations
            .iter()
            .filter(|r| r.coords().is_none())
            .map(|r| r.passengers)
            .sum();
        if unlocated > 0 {
            zone_loads.push(unlocated);
        }

        Self {
            total_passengers: pool.total_passengers(),
            parties: reservations.iter().map(|r| r.passengers).collect(),
            zone_loads,
        }
    }
}

/// A manual fleet entry as the operator sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualBus {
    pub capacity: i64,
    pub guide: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FleetPlanner {
    occupancy_band: (f64, f64),
    packing_attempts: usize,
}

impl Default for FleetPlanner {
    fn default() -> Self {
        Self::new(&PlannerConfig::default())
    }
}

impl FleetPlanner {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            occupancy_band: config.occupancy_band,
            packing_attempts: config.packing_attempts,
        }
    }

    /// Candidate fleets for automatic mode, distinct by composition.
    pub fn propose(&self, demand: &Demand, bus_sizes: &[u32]) -> Vec<FleetComposition> {
        let mut sizes: Vec<u32> = bus_sizes.iter().copied().filter(|s| *s > 0).collect();
        sizes.sort_unstable();
        sizes.dedup();

        if demand.total_passengers == 0 || sizes.is_empty() {
            return vec![FleetComposition::new(Strategy::MinimumFleet, Vec::new())];
        }

        let geographic = demand
            .zone_loads
            .iter()
            .flat_map(|load| minimum_fleet(*load, &sizes))
            .collect();
        let drafts = [
            (Strategy::MinimumFleet, minimum_fleet(demand.total_passengers, &sizes)),
            (
                Strategy::BalancedOccupancy,
                balanced_fleet(demand.total_passengers, &sizes, self.occupancy_band),
            ),
            (Strategy::GeographyFirst, geographic),
        ];

        let mut proposals: Vec<FleetComposition> = Vec::new();
        for (strategy, draft) in drafts {
            let capacities = self.make_packable(draft, &demand.parties, &sizes);
            if proposals.iter().any(|p| p.capacities == capacities) {
                debug!(?strategy, ?capacities, "dropping duplicate fleet proposal");
                continue;
            }
            proposals.push(FleetComposition::new(strategy, capacities));
        }
        proposals
    }

    /// Validates an operator-supplied fleet. Capacity below demand is fine;
    /// it shows up as unassigned reservations.
    pub fn accept(manual: &[ManualBus]) -> Result<FleetComposition, PlanningError> {
        if manual.is_empty() {
            return Err(PlanningError::InvalidRequest(
                "flotaManual debe contener al menos un bus".to_string(),
            ));
        }

        let mut capacities = Vec::with_capacity(manual.len());
        let mut guides = Vec::with_capacity(manual.len());
        for (slot, bus) in manual.iter().enumerate() {
            let capacity = u32::try_from(bus.capacity)
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| {
                    PlanningError::InvalidRequest(format!(
                        "la capacidad del bus {} debe ser un entero positivo (recibido {})",
                        slot + 1,
                        bus.capacity
                    ))
                })?;
            capacities.push(capacity);
            guides.push(bus.guide.clone().filter(|g| !g.trim().is_empty()));
        }

        Ok(FleetComposition {
            capacities,
            guides,
            strategy: Strategy::Manual,
        })
    }

    /// Grows a draft until first-fit decreasing seats every party that fits
    /// in the largest bus, or the attempt budget runs out. Result is sorted
    /// largest first.
    fn make_packable(&self, mut fleet: Vec<u32>, parties: &[u32], sizes: &[u32]) -> Vec<u32> {
        let largest = sizes.last().copied().unwrap_or(0);
        let placeable: Vec<u32> = parties.iter().copied().filter(|p| *p <= largest).collect();

        for _ in 0..self.packing_attempts {
            fleet.sort_unstable_by(|a, b| b.cmp(a));
            let Some(stranded) = first_fit_decreasing(&placeable, &fleet) else {
                break;
            };
            let upgrade = fleet.last().and_then(|smallest| {
                sizes.iter().copied().find(|s| *s >= smallest + stranded)
            });
            match (upgrade, fleet.last_mut()) {
                (Some(size), Some(smallest)) => *smallest = size,
                _ => fleet.push(smallest_fitting(stranded, sizes).unwrap_or(largest)),
            }
        }

        fleet.sort_unstable_by(|a, b| b.cmp(a));
        fleet
    }
}

/// As many buses of the largest tier as fill completely, then the smallest
/// tier holding the remainder. `sizes` ascending.
fn minimum_fleet(load: u32, sizes: &[u32]) -> Vec<u32> {
    let Some(&largest) = sizes.last() else {
        return Vec::new();
    };
    let mut fleet = vec![largest; (load / largest) as usize];
    let remainder = load % largest;
    if remainder > 0 {
        fleet.push(smallest_fitting(remainder, sizes).unwrap_or(largest));
    }
    fleet
}

/// The fewest buses of a single tier whose expected occupancy lands inside
/// the band. Falls back to the minimum fleet when no uniform fleet does.
fn balanced_fleet(total: u32, sizes: &[u32], band: (f64, f64)) -> Vec<u32> {
    let Some(&largest) = sizes.last() else {
        return Vec::new();
    };
    let (low, high) = band;
    let min_buses = ((f64::from(total) / (f64::from(largest) * high)).ceil() as u32).max(1);
    let max_buses = (min_buses + 4).min(total);

    for buses in min_buses..=max_buses {
        let per_bus = f64::from(total) / f64::from(buses);
        let Some(size) = sizes.iter().copied().find(|s| f64::from(*s) * high >= per_bus) else {
            continue;
        };
        let occupancy = f64::from(total) / f64::from(buses * size);
        if (low..=high).contains(&occupancy) {
            return vec![size; buses as usize];
        }
    }

    minimum_fleet(total, sizes)
}

fn smallest_fitting(load: u32, sizes: &[u32]) -> Option<u32> {
    sizes.iter().copied().find(|s| *s >= load)
}

/// Largest party first-fit decreasing cannot seat, or `None` when all fit.
fn first_fit_decreasing(parties: &[u32], fleet: &[u32]) -> Option<u32> {
    let mut sorted = parties.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut remaining = fleet.to_vec();
    for party in sorted {
        match remaining.iter_mut().find(|left| **left >= party) {
            Some(left) => *left -= party,
            None => return Some(party),
        }
    }
    None
}

/// Density-based grouping of points: a point with at least `min_points`
/// neighbours within `radius_km` (itself included) seeds a zone that grows
/// through its dense neighbours; the rest become single-point zones.
fn zones(points: &[(f64, f64)], radius_km: f64, min_points: usize) -> Vec<Vec<usize>> {
    let neighbours = |i: usize| -> Vec<usize> {
        (0..points.len())
            .filter(|&j| haversine_km(points[i], points[j]) <= radius_km)
            .collect()
    };

    let mut zone_of: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut result: Vec<Vec<usize>> = Vec::new();

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let seed = neighbours(start);
        if seed.len() < min_points {
            continue;
        }

        let zone = result.len();
        result.push(Vec::new());
        let mut queue = seed;
        let mut cursor = 0;
        while let Some(&member) = queue.get(cursor) {
            cursor += 1;
            if zone_of[member].is_none() {
                zone_of[member] = Some(zone);
                result[zone].push(member);
            }
            if !visited[member] {
                visited[member] = true;
                let around = neighbours(member);
                if around.len() >= min_points {
                    queue.extend(around.into_iter().filter(|n| zone_of[*n].is_none()));
                }
            }
        }
    }

    for (point, zone) in zone_of.iter().enumerate() {
        if zone.is_none() {
            result.push(vec![point]);
        }
    }
    result
}
