//! End-to-end planning of one request.

use std::sync::Arc;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler;
use crate::config::PlannerConfig;
use crate::distance::{DistanceCache, LocationIndex};
use crate::error::{PlanningError, ProviderError};
use crate::fleet::{Demand, FleetPlanner};
use crate::model::{Anchor, FleetComposition, Plan, Strategy, Suggestion, TourId};
use crate::pool::ReservationPool;
use crate::ranking;
use crate::request::PlanRequest;
use crate::solver::{self, AssignmentOutcome, SolveOptions};
use crate::traits::{DistanceProvider, DistanceTable, ReservationSource};

/// Turns planning requests into ranked plans.
///
/// Holds no state between requests: every call to [`Planner::plan`] loads
/// its own pool and owns its own distance cache, so concurrent requests
/// never observe each other.
pub struct Planner<S, P> {
    source: S,
    provider: Arc<P>,
    config: PlannerConfig,
    fleet_planner: FleetPlanner,
}

impl<S, P> Planner<S, P>
where
    S: ReservationSource,
    P: DistanceProvider + 'static,
{
    pub fn new(source: S, provider: P, config: PlannerConfig) -> Self {
        let fleet_planner = FleetPlanner::new(&config);
        Self {
            source,
            provider: Arc::new(provider),
            config,
            fleet_planner,
        }
    }

    pub fn plan(&self, request: &PlanRequest, cancel: &CancellationToken) -> Result<Plan, PlanningError> {
        let (tour_id, date, mode) = (request.tour_id(), request.date(), request.mode());
        if cancel.is_cancelled() {
            return Err(PlanningError::Cancelled);
        }
        info!(tour_id, %date, ?mode, "planning request");

        let pool = match ReservationPool::load(&self.source, tour_id, date) {
            Ok(pool) => pool,
            Err(PlanningError::DataUnavailable { .. }) => {
                info!(tour_id, %date, "no reservations, returning empty plan");
                let suggestion = match request {
                    PlanRequest::Automatic { .. } => Suggestion::empty(Strategy::MinimumFleet, 0),
                    PlanRequest::Assisted { fleet, .. } => self.idle_fleet(fleet),
                };
                return Ok(assembler::assemble(
                    ReservationPool::empty_analysis(tour_id, date),
                    vec![suggestion],
                    mode,
                    Vec::new(),
                ));
            }
            Err(err) => return Err(err),
        };

        let mut warnings: Vec<String> = pool
            .analysis()
            .missing_coordinates
            .iter()
            .map(|id| format!("La reserva {id} no tiene coordenadas válidas; su parada no suma distancia."))
            .collect();

        let (candidates, anchors, keep_idle_buses, limit) = match request {
            PlanRequest::Automatic { .. } => {
                let demand =
                    Demand::from_pool(&pool, self.config.zone_radius_km, self.config.zone_min_points);
                let proposals = self.fleet_planner.propose(&demand, &self.bus_sizes(tour_id));
                (proposals, &[] as &[Anchor], false, self.config.suggestion_limit)
            }
            PlanRequest::Assisted { fleet, anchors, .. } => {
                (vec![fleet.clone()], anchors.as_slice(), true, 1)
            }
        };
        debug!(candidates = candidates.len(), "evaluating candidate fleets");

        let outcomes = self.evaluate(&pool, &candidates, anchors, keep_idle_buses, cancel)?;
        for outcome in &outcomes {
            for warning in &outcome.warnings {
                if !warnings.contains(warning) {
                    warnings.push(warning.clone());
                }
            }
        }

        let ranked = ranking::rank(outcomes.into_iter().map(|o| o.suggestion).collect(), limit);
        let plan = assembler::assemble(pool.analysis().clone(), ranked, mode, warnings);
        info!(
            tour_id,
            %date,
            suggestions = plan.suggestions.len(),
            warnings = plan.warnings.len(),
            "plan ready"
        );
        Ok(plan)
    }

    /// The declared fleet with nobody on board, shaped like any other
    /// assisted suggestion.
    fn idle_fleet(&self, fleet: &FleetComposition) -> Suggestion {
        let locations = LocationIndex::build(self.config.origin, &[]);
        let options = SolveOptions {
            local_search_iterations: 0,
            keep_idle_buses: true,
            source_anchors: false,
        };
        solver::assign(&[], fleet, &[], &locations, &DistanceTable::trivial(locations.len()), &options).suggestion
    }

    /// Historical sizes for the tour, or the configured catalog. A failing
    /// lookup only costs the seed, not the request.
    fn bus_sizes(&self, tour_id: TourId) -> Vec<u32> {
        match self.source.historical_bus_sizes(tour_id) {
            Ok(sizes) if !sizes.is_empty() => sizes,
            Ok(_) => self.config.bus_sizes.clone(),
            Err(err) => {
                warn!(tour_id, error = %err, "historical bus sizes unavailable, using catalog");
                self.config.bus_sizes.clone()
            }
        }
    }

    /// Runs the engine once per candidate in parallel. A candidate whose
    /// distance table cannot be obtained is dropped; the request fails only
    /// when none survives.
    fn evaluate(
        &self,
        pool: &ReservationPool,
        candidates: &[FleetComposition],
        anchors: &[Anchor],
        keep_idle_buses: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<AssignmentOutcome>, PlanningError> {
        let locations = LocationIndex::build(self.config.origin, pool.reservations());
        let cache = DistanceCache::new(Arc::clone(&self.provider), self.config.provider_timeout);
        // Stored anchors name slots of the declared fleet; automatic fleets
        // prune and renumber their buses.
        let options = SolveOptions {
            local_search_iterations: self.config.local_search_iterations,
            keep_idle_buses,
            source_anchors: keep_idle_buses,
        };

        let results: Vec<Result<AssignmentOutcome, ProviderError>> = candidates
            .par_iter()
            .map(|fleet| {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                let table = cache.table(locations.locations(), cancel)?;
                let outcome = solver::assign(pool.reservations(), fleet, anchors, &locations, &table, &options);
                debug!(
                    strategy = ?fleet.strategy,
                    capacities = ?fleet.capacities,
                    km = outcome.suggestion.total_km,
                    unassigned = outcome.suggestion.unassigned.len(),
                    "candidate evaluated"
                );
                Ok(outcome)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (fleet, result) in candidates.iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(strategy = ?fleet.strategy, error = %err, "dropping candidate fleet");
                    failures.push(err);
                }
            }
        }

        if cancel.is_cancelled() || failures.contains(&ProviderError::Cancelled) {
            return Err(PlanningError::Cancelled);
        }
        if outcomes.is_empty() {
            return Err(if failures.iter().all(|err| *err == ProviderError::Timeout) {
                PlanningError::ProviderTimeout {
                    candidates: failures.len(),
                }
            } else {
                let detail = failures
                    .iter()
                    .find(|err| **err != ProviderError::Timeout)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                PlanningError::ProviderFailure(detail)
            });
        }
        Ok(outcomes)
    }
}
