//! Planning data model and its JSON wire shape.
//!
//! Field names on the wire follow the booking system's contract
//! (`Id_Reserva`, `combinacion`, `recorridoKm`, ...); the Rust names are
//! plain English.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Tour identifier as stored by the booking system.
pub type TourId = i64;

/// A pickup point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "Id_Punto")]
    pub id: i64,
    #[serde(rename = "NombrePunto", default)]
    pub name: String,
    #[serde(rename = "Latitud", default, deserialize_with = "de_opt_coord")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitud", default, deserialize_with = "de_opt_coord")]
    pub longitude: Option<f64>,
}

impl Point {
    pub fn new(id: i64, name: impl Into<String>, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// Usable (lat, lng), or `None` when either coordinate is missing or
    /// out of range.
    pub fn coords(&self) -> Option<(f64, f64)> {
        let (lat, lng) = (self.latitude?, self.longitude?);
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some((lat, lng))
    }
}

/// A booked party travelling together from one pickup point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "Id_Reserva", deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "NumeroPasajeros")]
    pub passengers: u32,
    #[serde(flatten)]
    pub point: Point,
    /// Sequencing hint along the tour's pickup route.
    #[serde(rename = "Posicion", default)]
    pub position: i32,
    /// Bus index this reservation was already pinned to, if any.
    #[serde(rename = "BusAnclado", default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<usize>,
}

impl Reservation {
    pub fn new(id: impl Into<String>, passengers: u32, point: Point) -> Self {
        Self {
            id: id.into(),
            passengers,
            point,
            position: 0,
            anchor: None,
        }
    }

    pub fn with_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    pub fn anchored_to(mut self, bus_index: usize) -> Self {
        self.anchor = Some(bus_index);
        self
    }

    pub fn coords(&self) -> Option<(f64, f64)> {
        self.point.coords()
    }
}

/// Caller-supplied pin of a reservation to a bus slot (0-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(rename = "reservationId", deserialize_with = "de_id")]
    pub reservation_id: String,
    #[serde(rename = "busIndex")]
    pub bus_index: usize,
}

impl Anchor {
    pub fn new(reservation_id: impl Into<String>, bus_index: usize) -> Self {
        Self {
            reservation_id: reservation_id.into(),
            bus_index,
        }
    }
}

/// How a fleet composition was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[serde(rename = "minima")]
    MinimumFleet,
    #[serde(rename = "balanceada")]
    BalancedOccupancy,
    #[serde(rename = "geografica")]
    GeographyFirst,
    Manual,
}

/// Ordered bus capacities for one planning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetComposition {
    pub capacities: Vec<u32>,
    /// Staff reference per slot, parallel to `capacities`.
    pub guides: Vec<Option<String>>,
    pub strategy: Strategy,
}

impl FleetComposition {
    pub fn new(strategy: Strategy, capacities: Vec<u32>) -> Self {
        let guides = vec![None; capacities.len()];
        Self {
            capacities,
            guides,
            strategy,
        }
    }

    pub fn total_capacity(&self) -> u32 {
        self.capacities.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }
}

/// A bus in a candidate plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bus {
    pub id: String,
    #[serde(rename = "capacidad")]
    pub capacity: u32,
    #[serde(rename = "ocupados")]
    pub occupied: u32,
    /// Assigned reservations in pickup order.
    #[serde(rename = "reservas")]
    pub reservations: Vec<Reservation>,
    #[serde(rename = "recorridoKm")]
    pub route_km: f64,
    #[serde(rename = "guia", skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
    /// Assigned reservations whose point has no usable coordinates; the
    /// route distance does not account for them.
    #[serde(rename = "paradasSinCoordenadas", skip_serializing_if = "Vec::is_empty")]
    pub missing_coordinates: Vec<String>,
}

impl Bus {
    pub fn is_idle(&self) -> bool {
        self.reservations.is_empty()
    }
}

/// One complete candidate assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "combinacion")]
    pub combination: Vec<u32>,
    pub buses: Vec<Bus>,
    #[serde(rename = "costoTotalKm")]
    pub total_km: f64,
    #[serde(rename = "ocupacionPromedio")]
    pub average_occupancy: f64,
    #[serde(rename = "totalBuses")]
    pub total_buses: usize,
    #[serde(rename = "reservasSinAsignar")]
    pub unassigned: Vec<Reservation>,
    #[serde(rename = "estrategia")]
    pub strategy: Strategy,
    #[serde(rename = "capacidadTotal")]
    pub total_capacity: u32,
}

impl Suggestion {
    /// A suggestion with no buses and nothing to seat.
    pub fn empty(strategy: Strategy, total_capacity: u32) -> Self {
        Self {
            combination: Vec::new(),
            buses: Vec::new(),
            total_km: 0.0,
            average_occupancy: 0.0,
            total_buses: 0,
            unassigned: Vec::new(),
            strategy,
            total_capacity,
        }
    }

    pub fn unassigned_passengers(&self) -> u32 {
        self.unassigned.iter().map(|r| r.passengers).sum()
    }

    pub fn assigned_passengers(&self) -> u32 {
        self.buses.iter().map(|b| b.occupied).sum()
    }

    /// Bus-to-reservation-set partition with bus order and stop order
    /// ignored. Two suggestions with equal keys seat the same parties
    /// together.
    pub fn partition_key(&self) -> Vec<Vec<&str>> {
        let mut groups: Vec<Vec<&str>> = self
            .buses
            .iter()
            .filter(|bus| !bus.is_idle())
            .map(|bus| {
                let mut ids: Vec<&str> = bus.reservations.iter().map(|r| r.id.as_str()).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        groups.sort_unstable();
        groups
    }
}

/// Read-only summary of the demand for a tour/date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "idTour")]
    pub tour_id: TourId,
    #[serde(rename = "totalPasajeros")]
    pub total_passengers: u32,
    #[serde(rename = "totalReservas")]
    pub total_reservations: usize,
    #[serde(rename = "reservasSinCoordenadas")]
    pub missing_coordinates: Vec<String>,
}

/// Automatic or assisted planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    Automatic,
    Assisted,
}

/// Response of a planning request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    #[serde(rename = "analisis")]
    pub analysis: Analysis,
    /// Ranked, best first.
    #[serde(rename = "sugerencias")]
    pub suggestions: Vec<Suggestion>,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "advertencias")]
    pub warnings: Vec<String>,
    /// Assisted mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Suggestion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoord {
    Number(f64),
    Text(String),
}

/// Coordinates arrive as numbers, decimal strings or null; anything
/// unparseable is treated as missing.
fn de_opt_coord<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawCoord>::deserialize(deserializer)? {
        Some(RawCoord::Number(value)) => Some(value),
        Some(RawCoord::Text(text)) => text.trim().parse::<f64>().ok(),
        None => None,
    })
}
