//! Test fixtures for bus-planner.
//!
//! Provides realistic test data including:
//! - Real Medellín pickup points
//! - Reservation builders and scripted collaborators

#![allow(dead_code)]

pub mod medellin_locations;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bus_planner::config::DEFAULT_ORIGIN;
use bus_planner::haversine::HaversineTable;
use bus_planner::model::{Point, Reservation, TourId};
use bus_planner::{DistanceProvider, DistanceTable, ProviderError, ReservationSource, SourceError};
use chrono::NaiveDate;
use parking_lot::Mutex;

pub use medellin_locations::*;

pub const ORIGIN: (f64, f64) = DEFAULT_ORIGIN;
pub const TOUR: TourId = 12;

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

pub fn reservation(id: &str, passengers: u32, location: &Location) -> Reservation {
    Reservation::new(
        id,
        passengers,
        Point::new(0, location.name, Some(location.lat), Some(location.lng)),
    )
}

pub fn ungeolocated(id: &str, passengers: u32) -> Reservation {
    Reservation::new(id, passengers, Point::new(0, "Sin ubicación", None, None))
}

/// One reservation per fixture location, cycling party sizes.
pub fn spread_reservations(sizes: &[u32]) -> Vec<Reservation> {
    all_locations()
        .iter()
        .cycle()
        .zip(sizes)
        .enumerate()
        .map(|(i, (location, passengers))| {
            reservation(&format!("r{i:02}"), *passengers, location).with_position(i as i32)
        })
        .collect()
}

/// What a [`ScriptedProvider`] does on a call.
#[derive(Debug, Clone)]
pub enum Reply {
    Table,
    Delayed(Duration),
    Error(ProviderError),
}

/// Great-circle provider whose answers follow a script, then a default.
pub struct ScriptedProvider {
    inner: HaversineTable,
    script: Mutex<VecDeque<Reply>>,
    otherwise: Reply,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn always(reply: Reply) -> Self {
        Self::scripted(Vec::new(), reply)
    }

    pub fn scripted(first: Vec<Reply>, otherwise: Reply) -> Self {
        Self {
            inner: HaversineTable::default(),
            script: Mutex::new(first.into()),
            otherwise,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DistanceProvider for ScriptedProvider {
    fn table_for(&self, locations: &[(f64, f64)]) -> Result<DistanceTable, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.otherwise.clone());
        match reply {
            Reply::Table => self.inner.table_for(locations),
            Reply::Delayed(delay) => {
                std::thread::sleep(delay);
                self.inner.table_for(locations)
            }
            Reply::Error(err) => Err(err),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A reservation source that is down.
pub struct UnavailableSource;

impl ReservationSource for UnavailableSource {
    fn reservations(&self, _tour_id: TourId, _date: NaiveDate) -> Result<Vec<Reservation>, SourceError> {
        Err(SourceError::Unavailable("connection refused".to_string()))
    }
}
