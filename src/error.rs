//! Error taxonomy for planning requests.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::model::TourId;

/// Failure of a single distance-provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("distance provider did not answer in time")]
    Timeout,
    #[error("distance provider unavailable: {0}")]
    Unavailable(String),
    #[error("distance provider returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("distance request cancelled")]
    Cancelled,
}

/// Failure of the reservation data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("reservation source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed reservation data: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no reservations for tour {tour_id} on {date}")]
    DataUnavailable { tour_id: TourId, date: NaiveDate },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("distance provider timed out for all {candidates} candidate fleets")]
    ProviderTimeout { candidates: usize },
    #[error("no candidate fleet could be evaluated: {0}")]
    ProviderFailure(String),
    #[error("planning request cancelled")]
    Cancelled,
}

impl PlanningError {
    /// Stable category used in the error payload.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "solicitud_invalida",
            Self::DataUnavailable { .. } => "sin_datos",
            Self::Source(_) => "fuente_de_datos",
            Self::ProviderTimeout { .. } | Self::ProviderFailure(_) => "proveedor_distancias",
            Self::Cancelled => "cancelada",
        }
    }

    /// Operator-facing message. Says whether the problem is the request, the
    /// data or an external dependency; internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(detail) => format!("Petición inválida: {detail}."),
            Self::DataUnavailable { tour_id, date } => {
                format!("No hay reservas para el tour {tour_id} en la fecha {date}.")
            }
            Self::Source(_) => {
                "No fue posible consultar las reservas. Intente de nuevo más tarde.".to_string()
            }
            Self::ProviderTimeout { .. } => {
                "El servicio de distancias no respondió a tiempo; no se generó ningún plan."
                    .to_string()
            }
            Self::ProviderFailure(_) => {
                "El servicio de distancias falló; no se generó ningún plan.".to_string()
            }
            Self::Cancelled => "La solicitud fue cancelada.".to_string(),
        }
    }
}

/// Error payload returned in place of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub categoria: &'static str,
    pub mensaje: String,
}

impl From<&PlanningError> for ErrorResponse {
    fn from(err: &PlanningError) -> Self {
        Self {
            error: true,
            categoria: err.category(),
            mensaje: err.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_is_not_data_absence() {
        let outage = PlanningError::from(SourceError::Unavailable("db down".to_string()));
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let empty = PlanningError::DataUnavailable { tour_id: 7, date };
        assert_ne!(outage.category(), empty.category());
        assert!(!outage.user_message().contains("db down"));
    }

    #[test]
    fn test_error_response_fields() {
        let err = PlanningError::ProviderTimeout { candidates: 3 };
        let response = ErrorResponse::from(&err);
        assert!(response.error);
        assert_eq!(response.categoria, "proveedor_distancias");
    }
}
