//! Planner configuration.

use std::time::Duration;

use thiserror::Error;

/// Base point the buses leave from (Medellín operations base).
pub const DEFAULT_ORIGIN: (f64, f64) = (6.212757856694648, -75.57759200491337);

/// Bus sizes the operator usually rents, smallest first.
pub const DEFAULT_BUS_SIZES: [u32; 9] = [18, 23, 25, 27, 38, 39, 40, 41, 43];

#[derive(Debug, Error)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Tour origin (lat, lng); every route starts here.
    pub origin: (f64, f64),
    /// Bus catalog used when the source has no historical sizes.
    pub bus_sizes: Vec<u32>,
    /// Number of ranked suggestions returned in automatic mode.
    pub suggestion_limit: usize,
    /// Target occupancy band for the balanced strategy.
    pub occupancy_band: (f64, f64),
    /// Neighbourhood radius for grouping pickup points into zones.
    pub zone_radius_km: f64,
    /// Minimum neighbours for a point to seed a zone.
    pub zone_min_points: usize,
    /// Time budget for one distance-provider call.
    pub provider_timeout: Duration,
    /// Upper bound on improvement passes after construction.
    pub local_search_iterations: usize,
    /// How many times a proposed fleet may be grown to fit every party.
    pub packing_attempts: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN,
            bus_sizes: DEFAULT_BUS_SIZES.to_vec(),
            suggestion_limit: 3,
            occupancy_band: (0.70, 0.95),
            zone_radius_km: 1.5,
            zone_min_points: 2,
            provider_timeout: Duration::from_secs(10),
            local_search_iterations: 100,
            packing_attempts: 8,
        }
    }
}

impl PlannerConfig {
    /// Defaults overridden by `PLANNER_*` environment variables (and a
    /// `.env` file if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(lat) = env_parse::<f64>("PLANNER_ORIGIN_LAT")? {
            config.origin.0 = lat;
        }
        if let Some(lng) = env_parse::<f64>("PLANNER_ORIGIN_LNG")? {
            config.origin.1 = lng;
        }
        if let Ok(raw) = std::env::var("PLANNER_BUS_SIZES") {
            config.bus_sizes = parse_bus_sizes(&raw).ok_or(ConfigError {
                key: "PLANNER_BUS_SIZES",
                value: raw,
            })?;
        }
        if let Some(limit) = env_parse::<usize>("PLANNER_SUGGESTION_LIMIT")? {
            config.suggestion_limit = limit.max(1);
        }
        if let Some(secs) = env_parse::<u64>("PLANNER_PROVIDER_TIMEOUT_SECS")? {
            config.provider_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { key, value }),
        Err(_) => Ok(None),
    }
}

/// Parses `"18, 25,40"`; every entry must be a positive integer.
fn parse_bus_sizes(raw: &str) -> Option<Vec<u32>> {
    let sizes = raw
        .split(',')
        .map(|part| part.trim().parse::<u32>().ok().filter(|size| *size > 0))
        .collect::<Option<Vec<_>>>()?;
    (!sizes.is_empty()).then_some(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bus_sizes() {
        assert_eq!(parse_bus_sizes("18, 25,40"), Some(vec![18, 25, 40]));
        assert_eq!(parse_bus_sizes("18,0"), None);
        assert_eq!(parse_bus_sizes("18,x"), None);
        assert_eq!(parse_bus_sizes(""), None);
    }

    #[test]
    fn test_default_band_is_ordered() {
        let config = PlannerConfig::default();
        assert!(config.occupancy_band.0 < config.occupancy_band.1);
        assert_eq!(config.suggestion_limit, 3);
    }
}
