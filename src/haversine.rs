//! Haversine distance table provider (fallback when OSRM is unavailable).
//!
//! Uses great-circle distance and an assumed speed. Less accurate than a
//! road network (ignores roads) but always available.

use crate::error::ProviderError;
use crate::traits::{DistanceProvider, DistanceTable};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lng) points in kilometers.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Haversine-based distance table provider.
#[derive(Debug, Clone)]
pub struct HaversineTable {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineTable {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineTable {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert distance in km to travel time in seconds.
    fn km_to_seconds(&self, km: f64) -> f64 {
        (km / self.speed_kmh * 3600.0).round()
    }
}

impl DistanceProvider for HaversineTable {
    fn table_for(&self, locations: &[(f64, f64)]) -> Result<DistanceTable, ProviderError> {
        let mut table = DistanceTable::trivial(locations.len());

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    let km = haversine_km(*from, *to);
                    table.distances_km[i][j] = km;
                    table.durations_secs[i][j] = self.km_to_seconds(km);
                }
            }
        }

        Ok(table)
    }

    fn name(&self) -> &str {
        "haversine"
    }
}
