//! OSRM HTTP adapter for distance tables.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ProviderError;
use crate::traits::{DistanceProvider, DistanceTable};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    /// HTTP timeout of a single attempt.
    pub timeout: Duration,
    /// Extra attempts after a timeout or transport error.
    pub max_retries: u32,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
        }
    }
}

impl OsrmConfig {
    /// `OSRM_URL` and `OSRM_PROFILE` over the defaults. `None` when no URL
    /// is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("OSRM_URL").ok()?;
        let mut config = Self {
            base_url,
            ..Self::default()
        };
        if let Ok(profile) = std::env::var("OSRM_PROFILE") {
            config.profile = profile;
        }
        Some(config)
    }

    /// Splits a time budget over the first attempt and every retry, so a
    /// retry still has a chance to land inside the budget.
    pub fn within_budget(mut self, budget: Duration) -> Self {
        self.timeout = budget / (self.max_retries + 1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[(f64, f64)]) -> String {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance,duration",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }

    fn fetch(&self, url: &str) -> Result<OsrmTableResponse, ProviderError> {
        self.client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Timeout
                } else if err.is_decode() {
                    ProviderError::InvalidResponse(err.to_string())
                } else {
                    ProviderError::Unavailable(err.to_string())
                }
            })
    }
}

impl DistanceProvider for OsrmClient {
    fn table_for(&self, locations: &[(f64, f64)]) -> Result<DistanceTable, ProviderError> {
        if locations.len() < 2 {
            return Ok(DistanceTable::trivial(locations.len()));
        }

        let url = self.table_url(locations);
        let mut attempt = 0;
        let body = loop {
            match self.fetch(&url) {
                Ok(body) => break body,
                Err(err @ (ProviderError::Timeout | ProviderError::Unavailable(_)))
                    if attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    warn!(attempt, error = %err, "retrying OSRM table request");
                }
                Err(err) => return Err(err),
            }
        };

        body.into_table(locations.len())
    }

    fn name(&self) -> &str {
        "osrm"
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    distances: Option<Vec<Vec<Option<f64>>>>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    /// Metres to km. OSRM reports unroutable pairs as null; those fail the
    /// whole table rather than pretending the pair is free.
    fn into_table(self, expected: usize) -> Result<DistanceTable, ProviderError> {
        if self.code != "Ok" {
            return Err(ProviderError::InvalidResponse(format!("OSRM code {}", self.code)));
        }
        let convert = |rows: Option<Vec<Vec<Option<f64>>>>, scale: f64| {
            rows.ok_or_else(|| ProviderError::InvalidResponse("missing annotation".to_string()))?
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|value| {
                            value.map(|v| v * scale).ok_or_else(|| {
                                ProviderError::InvalidResponse("unroutable pair".to_string())
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let table = DistanceTable {
            distances_km: convert(self.distances, 0.001)?,
            durations_secs: convert(self.durations, 1.0)?,
        };
        table.validate(expected)?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_uses_lng_lat_order() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://osrm:5000/".to_string(),
            ..OsrmConfig::default()
        })
        .unwrap();
        let url = client.table_url(&[(6.2, -75.5), (6.3, -75.6)]);
        assert_eq!(
            url,
            "http://osrm:5000/table/v1/car/-75.500000,6.200000;-75.600000,6.300000?annotations=distance,duration"
        );
    }

    #[test]
    fn test_budget_covers_every_attempt() {
        let config = OsrmConfig {
            max_retries: 2,
            ..OsrmConfig::default()
        }
        .within_budget(Duration::from_secs(9));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_response_converts_metres() {
        let body: OsrmTableResponse = serde_json::from_str(
            r#"{"code":"Ok","distances":[[0,1500],[1400,0]],"durations":[[0,120],[110,0]]}"#,
        )
        .unwrap();
        let table = body.into_table(2).unwrap();
        assert_eq!(table.km(0, 1), 1.5);
        assert_eq!(table.durations_secs[1][0], 110.0);
    }

    #[test]
    fn test_response_with_unroutable_pair_is_invalid() {
        let body: OsrmTableResponse = serde_json::from_str(
            r#"{"code":"Ok","distances":[[0,null],[1400,0]],"durations":[[0,120],[110,0]]}"#,
        )
        .unwrap();
        assert!(matches!(body.into_table(2), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_single_location_needs_no_request() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://unreachable.invalid".to_string(),
            ..OsrmConfig::default()
        })
        .unwrap();
        let table = client.table_for(&[(6.2, -75.5)]).unwrap();
        assert_eq!(table.size(), 1);
    }
}
