//! bus-planner: assigns tour reservations to buses.
//!
//! Given the reservations of a tour on a date, proposes fleets (or takes the
//! operator's), seats every party under capacity limits while keeping
//! pickup routes short, and returns ranked candidate plans.

pub mod assembler;
pub mod config;
pub mod distance;
pub mod error;
pub mod fleet;
pub mod haversine;
pub mod model;
pub mod osrm;
pub mod planner;
pub mod pool;
pub mod ranking;
pub mod request;
pub mod solver;
pub mod traits;

pub use config::PlannerConfig;
pub use error::{ErrorResponse, PlanningError, ProviderError, SourceError};
pub use model::{Anchor, Bus, Plan, PlanMode, Reservation, Suggestion};
pub use planner::Planner;
pub use request::PlanRequest;
pub use traits::{DistanceProvider, DistanceTable, ReservationSource};
