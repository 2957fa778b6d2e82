//! Collaborator traits consumed by the planner.
//!
//! The planner never talks to a database or a routing engine directly. It is
//! handed a [`ReservationSource`] for the booking data and a
//! [`DistanceProvider`] for road distances, and stays a pure function of what
//! those return.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::{ProviderError, SourceError};
use crate::model::{Reservation, TourId};

/// Travel distances and durations between an ordered list of locations.
///
/// Both tables are indexed by the order of the locations passed to
/// [`DistanceProvider::table_for`].
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable {
    /// Distance in kilometres `[from][to]`.
    pub distances_km: Vec<Vec<f64>>,
    /// Travel time in seconds `[from][to]`.
    pub durations_secs: Vec<Vec<f64>>,
}

impl DistanceTable {
    /// Table for a single location (or none).
    pub fn trivial(size: usize) -> Self {
        Self {
            distances_km: vec![vec![0.0; size]; size],
            durations_secs: vec![vec![0.0; size]; size],
        }
    }

    pub fn size(&self) -> usize {
        self.distances_km.len()
    }

    /// Distance in km between two location indices.
    ///
    /// Out-of-range lookups read as zero; callers only ever index locations
    /// they registered.
    pub fn km(&self, from: usize, to: usize) -> f64 {
        self.distances_km
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Checks the table is square with `expected` rows and non-negative,
    /// finite entries.
    pub fn validate(&self, expected: usize) -> Result<(), ProviderError> {
        let square = |table: &[Vec<f64>]| {
            table.len() == expected && table.iter().all(|row| row.len() == expected)
        };
        if !square(&self.distances_km) || !square(&self.durations_secs) {
            return Err(ProviderError::InvalidResponse(format!(
                "expected a {expected}x{expected} table"
            )));
        }
        let sane = self
            .distances_km
            .iter()
            .chain(self.durations_secs.iter())
            .flatten()
            .all(|value| value.is_finite() && *value >= 0.0);
        if !sane {
            return Err(ProviderError::InvalidResponse(
                "negative or non-finite entry in table".to_string(),
            ));
        }
        Ok(())
    }
}

/// Provides a distance/time table for a set of locations (lat, lng).
///
/// Implementations are expected to answer in bounded time and to report a
/// slow backend as [`ProviderError::Timeout`].
pub trait DistanceProvider: Send + Sync {
    fn table_for(&self, locations: &[(f64, f64)]) -> Result<DistanceTable, ProviderError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

impl<T: DistanceProvider + ?Sized> DistanceProvider for Box<T> {
    fn table_for(&self, locations: &[(f64, f64)]) -> Result<DistanceTable, ProviderError> {
        (**self).table_for(locations)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: DistanceProvider + ?Sized> DistanceProvider for Arc<T> {
    fn table_for(&self, locations: &[(f64, f64)]) -> Result<DistanceTable, ProviderError> {
        (**self).table_for(locations)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Booking data for a tour on a date.
pub trait ReservationSource: Send + Sync {
    /// Confirmed group reservations for the tour/date. An empty list means
    /// no demand, not an outage.
    fn reservations(&self, tour_id: TourId, date: NaiveDate) -> Result<Vec<Reservation>, SourceError>;

    /// Bus sizes historically used for the tour, as a seed for fleet
    /// proposals. Empty means "use the configured catalog".
    fn historical_bus_sizes(&self, _tour_id: TourId) -> Result<Vec<u32>, SourceError> {
        Ok(Vec::new())
    }
}
