//! Assignment engine: seats reservations in a fleet under capacity limits.
//!
//! Construction is greedy. Anchored reservations go in first, the rest are
//! taken in nearest-neighbour order from the tour origin and each lands in
//! the bus where it adds the least route distance. A bounded local search
//! (2-opt inside a bus, relocation between buses) then shortens the routes
//! without ever breaking capacity or moving an anchored reservation.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::distance::{LocationIndex, ORIGIN};
use crate::model::{Anchor, Bus, FleetComposition, Reservation, Suggestion};
use crate::traits::DistanceTable;

/// Improvements smaller than this are noise.
const EPSILON_KM: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Maximum passes of the improvement phase.
    pub local_search_iterations: usize,
    /// Keep buses that received no reservation (assisted mode keeps the
    /// declared fleet intact).
    pub keep_idle_buses: bool,
    /// Pin reservations to the bus slot stored with them. Only meaningful
    /// when slots survive into the result, so automatic runs leave it off.
    pub source_anchors: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            local_search_iterations: 100,
            keep_idle_buses: false,
            source_anchors: false,
        }
    }
}

/// A suggestion plus the operator warnings raised while building it.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub suggestion: Suggestion,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
struct BusState<'a> {
    capacity: u32,
    guide: Option<String>,
    stops: Vec<&'a Reservation>,
    occupied: u32,
    km: f64,
}

impl<'a> BusState<'a> {
    fn remaining(&self) -> u32 {
        self.capacity - self.occupied
    }

    fn board(&mut self, reservation: &'a Reservation, cost: &RouteCost<'_>) {
        let (position, _) = cost.cheapest_insertion(&self.stops, reservation);
        self.stops.insert(position, reservation);
        self.occupied += reservation.passengers;
        self.km = cost.km(&self.stops);
    }

    fn alight(&mut self, index: usize, cost: &RouteCost<'_>) -> &'a Reservation {
        let reservation = self.stops.remove(index);
        self.occupied -= reservation.passengers;
        self.km = cost.km(&self.stops);
        reservation
    }
}

/// Route distances over one location index and table.
struct RouteCost<'c> {
    locations: &'c LocationIndex,
    table: &'c DistanceTable,
}

impl RouteCost<'_> {
    /// Origin, then every stop with coordinates in order. Stops without
    /// coordinates add nothing.
    fn km(&self, stops: &[&Reservation]) -> f64 {
        let mut previous = ORIGIN;
        let mut total = 0.0;
        for stop in stops {
            if let Some(location) = self.locations.of(&stop.id) {
                total += self.table.km(previous, location);
                previous = location;
            }
        }
        total
    }

    /// Best position for `candidate` in `stops` and the distance it adds.
    fn cheapest_insertion(&self, stops: &[&Reservation], candidate: &Reservation) -> (usize, f64) {
        if self.locations.of(&candidate.id).is_none() {
            return (stops.len(), 0.0);
        }

        let current = self.km(stops);
        let mut best = (stops.len(), f64::INFINITY);
        for position in 0..=stops.len() {
            let mut route: Vec<&Reservation> = stops.to_vec();
            route.insert(position, candidate);
            let marginal = self.km(&route) - current;
            if marginal < best.1 {
                best = (position, marginal);
            }
        }
        best
    }
}

/// Assigns `reservations` to the buses of `fleet`.
///
/// `anchors` pin reservations to bus slots (0-based) and are applied in the
/// order they are listed, so when two of them overflow one bus the later
/// one is demoted. Anchors stored with the reservations come after them, in
/// pool order, and only when [`SolveOptions::source_anchors`] is set; a
/// listed anchor replaces a stored one. An anchor that names a missing bus
/// or would overflow it is demoted and the reservation is placed like any
/// other.
///
/// A party that finds no bus with room triggers a repair: unanchored
/// parties are moved between buses to open a gap, and failing that the
/// unanchored load is repacked first-fit decreasing. Every reservation ends
/// up in exactly one bus or in the unassigned list.
pub fn assign(
    reservations: &[Reservation],
    fleet: &FleetComposition,
    anchors: &[Anchor],
    locations: &LocationIndex,
    table: &DistanceTable,
    options: &SolveOptions,
) -> AssignmentOutcome {
    let cost = RouteCost { locations, table };
    let mut warnings = Vec::new();
    let mut buses: Vec<BusState> = fleet
        .capacities
        .iter()
        .zip(fleet.guides.iter().chain(std::iter::repeat(&None)))
        .map(|(capacity, guide)| BusState {
            capacity: *capacity,
            guide: guide.clone(),
            stops: Vec::new(),
            occupied: 0,
            km: 0.0,
        })
        .collect();

    let (anchored, mut pending) = anchor_order(reservations, anchors, options.source_anchors, &mut warnings);
    let mut pinned: HashSet<&str> = HashSet::new();

    for (reservation, bus_index) in anchored {
        match buses.get_mut(bus_index) {
            None => {
                warn!(reservation = %reservation.id, bus_index, "anchor names a bus outside the fleet");
                warnings.push(format!(
                    "La reserva {} está anclada al bus {}, que no existe en la flota; se asignó normalmente.",
                    reservation.id,
                    bus_index + 1
                ));
                pending.push(reservation);
            }
            Some(bus) if bus.remaining() < reservation.passengers => {
                warn!(reservation = %reservation.id, bus_index, "anchor would overflow bus");
                warnings.push(format!(
                    "La reserva {} ({} pasajeros) no cabe en el bus {} al que fue anclada; se asignó normalmente.",
                    reservation.id,
                    reservation.passengers,
                    bus_index + 1
                ));
                pending.push(reservation);
            }
            Some(bus) => {
                bus.board(reservation, &cost);
                pinned.insert(reservation.id.as_str());
            }
        }
    }

    let mut stranded: Vec<&Reservation> = Vec::new();
    for reservation in proximity_order(pending, &cost) {
        let mut best: Option<(usize, f64)> = None;
        for (bus_index, bus) in buses.iter().enumerate() {
            if bus.remaining() < reservation.passengers {
                continue;
            }
            let (_, marginal) = cost.cheapest_insertion(&bus.stops, reservation);
            if best.is_none_or(|(_, best_marginal)| marginal < best_marginal) {
                best = Some((bus_index, marginal));
            }
        }

        match best {
            Some((bus_index, _)) => buses[bus_index].board(reservation, &cost),
            None => stranded.push(reservation),
        }
    }

    let mut unassigned = if stranded.is_empty() {
        stranded
    } else {
        repair(&mut buses, stranded, &pinned, &cost)
    };

    local_search(&mut buses, &pinned, &cost, options.local_search_iterations);

    unassigned.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    let suggestion = finalize(fleet, buses, unassigned, locations, options);
    debug!(
        strategy = ?suggestion.strategy,
        buses = suggestion.total_buses,
        unassigned = suggestion.unassigned.len(),
        km = suggestion.total_km,
        "assignment finished"
    );

    AssignmentOutcome {
        suggestion,
        warnings,
    }
}

/// Splits the pool into anchored reservations, in the order their anchors
/// apply, and the rest. Anchors for unknown reservations and repeated
/// anchors are reported and skipped.
fn anchor_order<'a>(
    reservations: &'a [Reservation],
    anchors: &[Anchor],
    source_anchors: bool,
    warnings: &mut Vec<String>,
) -> (Vec<(&'a Reservation, usize)>, Vec<&'a Reservation>) {
    let by_id: HashMap<&str, &Reservation> = reservations.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut anchored = Vec::new();
    let mut listed: HashSet<&str> = HashSet::new();

    for anchor in anchors {
        let id = anchor.reservation_id.as_str();
        let Some(&reservation) = by_id.get(id) else {
            warnings.push(format!(
                "El anclaje de la reserva {id} no corresponde a ninguna reserva del tour; se ignoró."
            ));
            continue;
        };
        if !listed.insert(reservation.id.as_str()) {
            warnings.push(format!("La reserva {id} tiene más de un anclaje; se usó el primero."));
            continue;
        }
        anchored.push((reservation, anchor.bus_index));
    }

    let mut free = Vec::new();
    for reservation in reservations {
        if listed.contains(reservation.id.as_str()) {
            continue;
        }
        match reservation.anchor {
            Some(bus_index) if source_anchors => anchored.push((reservation, bus_index)),
            _ => free.push(reservation),
        }
    }

    (anchored, free)
}

/// Seats what construction could not. First tries to open a gap for each
/// stranded party by moving unanchored parties out of one bus into others;
/// whatever is still left over makes the whole unanchored load get repacked
/// first-fit decreasing, kept only if it seats more. Returns the
/// reservations that remain unassigned.
fn repair<'a>(
    buses: &mut [BusState<'a>],
    mut stranded: Vec<&'a Reservation>,
    pinned: &HashSet<&str>,
    cost: &RouteCost<'_>,
) -> Vec<&'a Reservation> {
    stranded.sort_by(|a, b| {
        b.passengers
            .cmp(&a.passengers)
            .then_with(|| a.position.cmp(&b.position))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut left = Vec::new();
    for party in stranded {
        let opened = (0..buses.len()).find(|target| make_room(buses, *target, party.passengers, pinned, cost));
        match opened {
            Some(target) => {
                debug!(reservation = %party.id, bus = target + 1, "moved parties to open a seat gap");
                buses[target].board(party, cost);
            }
            None => left.push(party),
        }
    }
    if left.is_empty() {
        return left;
    }

    let (repacked, still_left) = first_fit_decreasing(buses, &left, pinned, cost);
    if still_left.len() < left.len() {
        debug!(before = left.len(), after = still_left.len(), "repacked unanchored parties");
        buses.clone_from_slice(&repacked);
        return still_left;
    }
    left
}

/// Moves unanchored parties out of `target` into other buses until it has
/// `seats` free. Leaves `buses` untouched when that is not possible.
fn make_room(buses: &mut [BusState<'_>], target: usize, seats: u32, pinned: &HashSet<&str>, cost: &RouteCost<'_>) -> bool {
    if buses[target].capacity < seats {
        return false;
    }

    let mut trial = buses.to_vec();
    while trial[target].remaining() < seats {
        let missing = seats - trial[target].remaining();
        // (stop index, destination bus): smallest party that closes the gap
        // on its own, else the largest one that can move at all
        let mut closing: Option<(usize, usize)> = None;
        let mut largest: Option<(usize, usize)> = None;
        for (index, stop) in trial[target].stops.iter().enumerate() {
            if pinned.contains(stop.id.as_str()) {
                continue;
            }
            let destination = (0..trial.len())
                .filter(|to| *to != target && trial[*to].remaining() >= stop.passengers)
                .min_by(|a, b| {
                    let detour = |to: usize| cost.cheapest_insertion(&trial[to].stops, stop).1;
                    detour(*a).total_cmp(&detour(*b)).then_with(|| a.cmp(b))
                });
            let Some(to) = destination else {
                continue;
            };
            let passengers = stop.passengers;
            if passengers >= missing
                && closing.is_none_or(|(i, _)| passengers < trial[target].stops[i].passengers)
            {
                closing = Some((index, to));
            }
            if largest.is_none_or(|(i, _)| passengers > trial[target].stops[i].passengers) {
                largest = Some((index, to));
            }
        }

        let Some((index, to)) = closing.or(largest) else {
            return false;
        };
        let moved = trial[target].alight(index, cost);
        trial[to].board(moved, cost);
    }

    buses.clone_from_slice(&trial);
    true
}

/// First-fit decreasing over the seats anchored parties leave free: the
/// largest party goes first, into the first bus in fleet order with room.
fn first_fit_decreasing<'a>(
    buses: &[BusState<'a>],
    left: &[&'a Reservation],
    pinned: &HashSet<&str>,
    cost: &RouteCost<'_>,
) -> (Vec<BusState<'a>>, Vec<&'a Reservation>) {
    let mut parties: Vec<&Reservation> = left.to_vec();
    let mut repacked: Vec<BusState> = buses
        .iter()
        .map(|bus| {
            let (anchored, free): (Vec<&Reservation>, Vec<&Reservation>) =
                bus.stops.iter().copied().partition(|stop| pinned.contains(stop.id.as_str()));
            parties.extend(free);
            BusState {
                occupied: anchored.iter().map(|stop| stop.passengers).sum(),
                km: cost.km(&anchored),
                stops: anchored,
                ..bus.clone()
            }
        })
        .collect();

    parties.sort_by(|a, b| {
        b.passengers
            .cmp(&a.passengers)
            .then_with(|| a.position.cmp(&b.position))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut still_left = Vec::new();
    for party in parties {
        match repacked.iter_mut().find(|bus| bus.remaining() >= party.passengers) {
            Some(bus) => bus.board(party, cost),
            None => still_left.push(party),
        }
    }
    (repacked, still_left)
}

/// Greedy nearest-neighbour chain from the origin. Ties go to the lower
/// sequencing hint, then the lower id. Reservations without coordinates
/// follow the chain in hint order.
fn proximity_order<'a>(pending: Vec<&'a Reservation>, cost: &RouteCost<'_>) -> Vec<&'a Reservation> {
    let (mut located, mut unlocated): (Vec<&Reservation>, Vec<&Reservation>) = pending
        .into_iter()
        .partition(|r| cost.locations.of(&r.id).is_some());

    let mut ordered = Vec::with_capacity(located.len() + unlocated.len());
    let mut current = ORIGIN;
    while !located.is_empty() {
        let distance = |r: &Reservation| {
            cost.locations
                .of(&r.id)
                .map_or(f64::INFINITY, |location| cost.table.km(current, location))
        };
        let next = located
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                distance(**a)
                    .total_cmp(&distance(**b))
                    .then_with(|| a.position.cmp(&b.position))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|(index, _)| index);
        let Some(index) = next else {
            break;
        };
        let reservation = located.swap_remove(index);
        current = cost.locations.of(&reservation.id).unwrap_or(current);
        ordered.push(reservation);
    }

    unlocated.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    ordered.extend(unlocated);
    ordered
}

fn local_search(buses: &mut [BusState<'_>], pinned: &HashSet<&str>, cost: &RouteCost<'_>, iterations: usize) {
    for _ in 0..iterations {
        let mut improved = false;

        for bus in buses.iter_mut() {
            if two_opt_improve(bus, cost) {
                improved = true;
            }
        }

        if relocate_improve(buses, pinned, cost) {
            improved = true;
        }

        if !improved {
            break;
        }
    }
}

/// 2-opt: reverse a segment of a bus route if that shortens it.
fn two_opt_improve(bus: &mut BusState<'_>, cost: &RouteCost<'_>) -> bool {
    let n = bus.stops.len();
    if n < 2 {
        return false;
    }

    for i in 0..n - 1 {
        for j in i + 1..n {
            let mut candidate = bus.stops.clone();
            candidate[i..=j].reverse();
            let km = cost.km(&candidate);
            if km < bus.km - EPSILON_KM {
                bus.stops = candidate;
                bus.km = km;
                return true;
            }
        }
    }

    false
}

/// Relocate: move an unanchored reservation into another bus that already
/// runs, when the saving on its current route beats the detour it adds.
fn relocate_improve(buses: &mut [BusState<'_>], pinned: &HashSet<&str>, cost: &RouteCost<'_>) -> bool {
    for from in 0..buses.len() {
        for index in 0..buses[from].stops.len() {
            let stop = buses[from].stops[index];
            if pinned.contains(stop.id.as_str()) {
                continue;
            }

            let mut reduced = buses[from].stops.clone();
            reduced.remove(index);
            let reduced_km = cost.km(&reduced);
            let saving = buses[from].km - reduced_km;

            for to in 0..buses.len() {
                if to == from || buses[to].stops.is_empty() || buses[to].remaining() < stop.passengers {
                    continue;
                }
                let (position, marginal) = cost.cheapest_insertion(&buses[to].stops, stop);
                if marginal < saving - EPSILON_KM {
                    let source = &mut buses[from];
                    source.stops = reduced;
                    source.occupied -= stop.passengers;
                    source.km = reduced_km;

                    let target = &mut buses[to];
                    target.stops.insert(position, stop);
                    target.occupied += stop.passengers;
                    target.km = cost.km(&target.stops);
                    return true;
                }
            }
        }
    }

    false
}

fn finalize(
    fleet: &FleetComposition,
    buses: Vec<BusState<'_>>,
    unassigned: Vec<&Reservation>,
    locations: &LocationIndex,
    options: &SolveOptions,
) -> Suggestion {
    let buses: Vec<Bus> = buses
        .into_iter()
        .filter(|bus| options.keep_idle_buses || !bus.stops.is_empty())
        .enumerate()
        .map(|(ordinal, bus)| Bus {
            id: (ordinal + 1).to_string(),
            capacity: bus.capacity,
            occupied: bus.occupied,
            missing_coordinates: bus
                .stops
                .iter()
                .filter(|stop| locations.of(&stop.id).is_none())
                .map(|stop| stop.id.clone())
                .collect(),
            reservations: bus.stops.into_iter().cloned().collect(),
            route_km: round_to(bus.km, 100.0),
            guide: bus.guide,
        })
        .collect();

    let combination: Vec<u32> = buses.iter().map(|bus| bus.capacity).collect();
    let total_capacity: u32 = combination.iter().sum();
    let occupied: u32 = buses.iter().map(|bus| bus.occupied).sum();
    let average_occupancy = if total_capacity == 0 {
        0.0
    } else {
        round_to(f64::from(occupied) / f64::from(total_capacity), 10_000.0)
    };
    let total_km = round_to(buses.iter().map(|bus| bus.route_km).sum(), 100.0);

    Suggestion {
        total_buses: buses.len(),
        combination,
        buses,
        total_km,
        average_occupancy,
        unassigned: unassigned.into_iter().cloned().collect(),
        strategy: fleet.strategy,
        total_capacity,
    }
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}
