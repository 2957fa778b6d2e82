//! Location indexing and the request-scoped distance cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::model::Reservation;
use crate::traits::{DistanceProvider, DistanceTable};

/// Index of the tour origin in every [`LocationIndex`].
pub const ORIGIN: usize = 0;

/// Unique locations of a planning run: the origin first, then every
/// distinct usable pickup coordinate.
#[derive(Debug, Clone)]
pub struct LocationIndex {
    locations: Vec<(f64, f64)>,
    by_reservation: HashMap<String, usize>,
}

impl LocationIndex {
    pub fn build(origin: (f64, f64), reservations: &[Reservation]) -> Self {
        let mut locations = vec![origin];
        let mut seen: HashMap<String, usize> = HashMap::new();
        seen.insert(location_key(origin), ORIGIN);
        let mut by_reservation = HashMap::new();

        for reservation in reservations {
            let Some(coords) = reservation.coords() else {
                continue;
            };
            let index = *seen.entry(location_key(coords)).or_insert_with(|| {
                locations.push(coords);
                locations.len() - 1
            });
            by_reservation.insert(reservation.id.clone(), index);
        }

        Self {
            locations,
            by_reservation,
        }
    }

    pub fn locations(&self) -> &[(f64, f64)] {
        &self.locations
    }

    /// Location of a reservation, `None` when its point has no usable
    /// coordinates.
    pub fn of(&self, reservation_id: &str) -> Option<usize> {
        self.by_reservation.get(reservation_id).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

fn location_key(location: (f64, f64)) -> String {
    format!("{:.6},{:.6}", location.0, location.1)
}

/// How often a pending provider call looks at the cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
enum Fetched {
    Table(Arc<DistanceTable>),
    TimedOut,
}

/// Distance tables fetched during one planning request.
///
/// Lives exactly as long as the request and is passed down explicitly, so
/// runs never share state. Each provider call runs on its own thread and is
/// abandoned once the time budget or the cancellation token says so; the
/// budget covers the whole call, provider-side retries included. A location
/// set that timed out stays timed out for the request. Other failures are
/// not cached: the next candidate asking for the same table tries again.
pub struct DistanceCache<P: DistanceProvider + ?Sized + 'static> {
    provider: Arc<P>,
    timeout: Duration,
    tables: Mutex<HashMap<String, Fetched>>,
}

impl<P: DistanceProvider + ?Sized + 'static> DistanceCache<P> {
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn table(
        &self,
        locations: &[(f64, f64)],
        cancel: &CancellationToken,
    ) -> Result<Arc<DistanceTable>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let key = locations
            .iter()
            .map(|location| location_key(*location))
            .collect::<Vec<_>>()
            .join(";");

        // Held across the fetch so concurrent candidates share one call.
        let mut tables = self.tables.lock();
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        match tables.get(&key) {
            Some(Fetched::Table(table)) => {
                debug!(locations = locations.len(), "distance table cache hit");
                return Ok(Arc::clone(table));
            }
            Some(Fetched::TimedOut) => {
                debug!(locations = locations.len(), "distance table already timed out");
                return Err(ProviderError::Timeout);
            }
            None => {}
        }

        let table = if locations.len() < 2 {
            DistanceTable::trivial(locations.len())
        } else {
            match self.fetch(locations, cancel) {
                Ok(table) => table,
                Err(ProviderError::Timeout) => {
                    tables.insert(key, Fetched::TimedOut);
                    return Err(ProviderError::Timeout);
                }
                Err(err) => return Err(err),
            }
        };

        let table = Arc::new(table);
        tables.insert(key, Fetched::Table(Arc::clone(&table)));
        Ok(table)
    }

    /// One provider call, waited on for at most the time budget.
    fn fetch(&self, locations: &[(f64, f64)], cancel: &CancellationToken) -> Result<DistanceTable, ProviderError> {
        let (sender, receiver) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let owned = locations.to_vec();
        thread::Builder::new()
            .name("distance-table".to_string())
            .spawn(move || {
                // nobody is listening once the wait gave up
                let _ = sender.send(provider.table_for(&owned));
            })
            .map_err(|err| ProviderError::Unavailable(format!("cannot start provider call: {err}")))?;

        let started = Instant::now();
        let deadline = started + self.timeout;
        let result = loop {
            if cancel.is_cancelled() {
                debug!(provider = self.provider.name(), "abandoning distance table on cancellation");
                return Err(ProviderError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    provider = self.provider.name(),
                    budget_ms = self.timeout.as_millis() as u64,
                    "distance table did not arrive within its time budget"
                );
                return Err(ProviderError::Timeout);
            }
            match receiver.recv_timeout((deadline - now).min(CANCEL_POLL)) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ProviderError::Unavailable("provider call ended without an answer".to_string()));
                }
            }
        };

        let table = result?;
        table.validate(locations.len())?;
        debug!(
            provider = self.provider.name(),
            locations = locations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched distance table"
        );
        Ok(table)
    }
}
