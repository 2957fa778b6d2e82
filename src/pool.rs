//! Reservation pool for a (tour, date) pair.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PlanningError, SourceError};
use crate::model::{Analysis, Reservation, TourId};
use crate::traits::ReservationSource;

/// The reservations to place in one planning run, plus their summary.
#[derive(Debug, Clone)]
pub struct ReservationPool {
    reservations: Vec<Reservation>,
    analysis: Analysis,
}

impl ReservationPool {
    /// Loads and checks the reservations for a tour/date.
    ///
    /// An empty result is reported as [`PlanningError::DataUnavailable`] so
    /// the caller can tell "no passengers" apart from a failing source.
    pub fn load<S>(source: &S, tour_id: TourId, date: NaiveDate) -> Result<Self, PlanningError>
    where
        S: ReservationSource + ?Sized,
    {
        let reservations = source.reservations(tour_id, date)?;
        Self::from_reservations(tour_id, date, reservations)
    }

    pub fn from_reservations(
        tour_id: TourId,
        date: NaiveDate,
        mut reservations: Vec<Reservation>,
    ) -> Result<Self, PlanningError> {
        if reservations.is_empty() {
            return Err(PlanningError::DataUnavailable { tour_id, date });
        }

        let mut ids = HashSet::new();
        for reservation in &reservations {
            if reservation.passengers == 0 {
                return Err(SourceError::Malformed(format!(
                    "reservation {} has no passengers",
                    reservation.id
                ))
                .into());
            }
            if !ids.insert(reservation.id.as_str()) {
                return Err(SourceError::Malformed(format!(
                    "reservation {} listed twice",
                    reservation.id
                ))
                .into());
            }
        }

        reservations.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

        let missing_coordinates: Vec<String> = reservations
            .iter()
            .filter(|r| r.coords().is_none())
            .map(|r| r.id.clone())
            .collect();
        if !missing_coordinates.is_empty() {
            warn!(
                tour_id,
                %date,
                count = missing_coordinates.len(),
                "reservations without usable pickup coordinates"
            );
        }

        let analysis = Analysis {
            date,
            tour_id,
            total_passengers: reservations.iter().map(|r| r.passengers).sum(),
            total_reservations: reservations.len(),
            missing_coordinates,
        };
        debug!(
            tour_id,
            %date,
            reservations = analysis.total_reservations,
            passengers = analysis.total_passengers,
            "loaded reservation pool"
        );

        Ok(Self {
            reservations,
            analysis,
        })
    }

    /// Summary used when there is nothing to plan.
    pub fn empty_analysis(tour_id: TourId, date: NaiveDate) -> Analysis {
        Analysis {
            date,
            tour_id,
            total_passengers: 0,
            total_reservations: 0,
            missing_coordinates: Vec::new(),
        }
    }

    /// Reservations ordered by sequencing hint, then id.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    pub fn total_passengers(&self) -> u32 {
        self.analysis.total_passengers
    }
}

/// Reservation source backed by an in-memory snapshot.
///
/// The snapshot JSON looks like
/// `{ "busSizes": [..], "tours": [{ "idTour": 1, "fecha": "2025-03-01", "reservas": [..] }] }`.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    bus_sizes: Vec<u32>,
    tour_bus_sizes: HashMap<TourId, Vec<u32>>,
    tours: HashMap<(TourId, NaiveDate), Vec<Reservation>>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(rename = "busSizes", default)]
    bus_sizes: Vec<u32>,
    #[serde(default)]
    tours: Vec<TourSnapshot>,
}

#[derive(Debug, Deserialize)]
struct TourSnapshot {
    #[serde(rename = "idTour")]
    tour_id: TourId,
    #[serde(rename = "fecha")]
    date: NaiveDate,
    #[serde(rename = "reservas", default)]
    reservations: Vec<Reservation>,
    #[serde(rename = "busSizes", default)]
    bus_sizes: Vec<u32>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|err| SourceError::Malformed(err.to_string()))?;

        let mut source = Self::new().with_bus_sizes(snapshot.bus_sizes);
        for tour in snapshot.tours {
            if !tour.bus_sizes.is_empty() {
                source.tour_bus_sizes.insert(tour.tour_id, tour.bus_sizes);
            }
            source = source.with_tour(tour.tour_id, tour.date, tour.reservations);
        }
        Ok(source)
    }

    pub fn with_tour(mut self, tour_id: TourId, date: NaiveDate, reservations: Vec<Reservation>) -> Self {
        self.tours.entry((tour_id, date)).or_default().extend(reservations);
        self
    }

    pub fn with_bus_sizes(mut self, sizes: Vec<u32>) -> Self {
        self.bus_sizes = sizes;
        self
    }
}

impl ReservationSource for InMemorySource {
    fn reservations(&self, tour_id: TourId, date: NaiveDate) -> Result<Vec<Reservation>, SourceError> {
        Ok(self.tours.get(&(tour_id, date)).cloned().unwrap_or_default())
    }

    fn historical_bus_sizes(&self, tour_id: TourId) -> Result<Vec<u32>, SourceError> {
        Ok(self
            .tour_bus_sizes
            .get(&tour_id)
            .cloned()
            .unwrap_or_else(|| self.bus_sizes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn reservation(id: &str, passengers: u32, position: i32) -> Reservation {
        Reservation::new(id, passengers, Point::new(1, "p", Some(6.2), Some(-75.5))).with_position(position)
    }

    #[test]
    fn test_empty_pool_is_data_unavailable() {
        let result = ReservationPool::load(&InMemorySource::new(), 3, date());
        assert!(matches!(result, Err(PlanningError::DataUnavailable { tour_id: 3, .. })));
    }

    #[test]
    fn test_zero_passenger_reservation_is_malformed() {
        let result = ReservationPool::from_reservations(1, date(), vec![reservation("a", 0, 1)]);
        assert!(matches!(result, Err(PlanningError::Source(SourceError::Malformed(_)))));
    }

    #[test]
    fn test_pool_keeps_ungeolocated_reservations() {
        let lost = Reservation::new("lost", 4, Point::new(2, "?", None, None));
        let pool = ReservationPool::from_reservations(1, date(), vec![reservation("a", 2, 1), lost]).unwrap();
        assert_eq!(pool.total_passengers(), 6);
        assert_eq!(pool.analysis().missing_coordinates, vec!["lost".to_string()]);
    }

    #[test]
    fn test_pool_orders_by_position_then_id() {
        let pool = ReservationPool::from_reservations(
            1,
            date(),
            vec![reservation("b", 1, 2), reservation("c", 1, 1), reservation("a", 1, 2)],
        )
        .unwrap();
        let ids: Vec<&str> = pool.reservations().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_snapshot_round_trip_through_source() {
        let json = r#"{
            "busSizes": [20, 40],
            "tours": [{
                "idTour": 5,
                "fecha": "2025-03-01",
                "reservas": [
                    {"Id_Reserva": "r1", "NumeroPasajeros": 4, "Id_Punto": 1, "Latitud": 6.2, "Longitud": -75.5}
                ]
            }]
        }"#;
        let source = InMemorySource::from_json(json).unwrap();
        assert_eq!(source.reservations(5, date()).unwrap().len(), 1);
        assert_eq!(source.historical_bus_sizes(5).unwrap(), vec![20, 40]);
        assert!(source.reservations(6, date()).unwrap().is_empty());
    }
}
