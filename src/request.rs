//! Planning requests as received on the wire.
//!
//! The body is one JSON object for both modes; a request carrying
//! `flotaManual` is assisted. Validation happens here so the planner only
//! ever sees well-formed requests.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::PlanningError;
use crate::fleet::{FleetPlanner, ManualBus};
use crate::model::{Anchor, FleetComposition, PlanMode, TourId};

#[derive(Debug, Clone, PartialEq)]
pub enum PlanRequest {
    Automatic {
        tour_id: TourId,
        date: NaiveDate,
    },
    Assisted {
        tour_id: TourId,
        date: NaiveDate,
        fleet: FleetComposition,
        anchors: Vec<Anchor>,
    },
}

impl PlanRequest {
    pub fn from_json(json: &str) -> Result<Self, PlanningError> {
        let body: PlanRequestBody =
            serde_json::from_str(json).map_err(|err| PlanningError::InvalidRequest(err.to_string()))?;
        Self::try_from(body)
    }

    pub fn tour_id(&self) -> TourId {
        match self {
            Self::Automatic { tour_id, .. } | Self::Assisted { tour_id, .. } => *tour_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Automatic { date, .. } | Self::Assisted { date, .. } => *date,
        }
    }

    pub fn mode(&self) -> PlanMode {
        match self {
            Self::Automatic { .. } => PlanMode::Automatic,
            Self::Assisted { .. } => PlanMode::Assisted,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanRequestBody {
    pub fecha: Option<String>,
    #[serde(rename = "idTour")]
    pub tour_id: Option<WireTourId>,
    #[serde(rename = "flotaManual")]
    pub manual_fleet: Option<Vec<ManualBusWire>>,
    #[serde(rename = "reservasAncladas", default)]
    pub anchors: Option<Vec<Anchor>>,
}

/// Tour ids arrive as numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTourId {
    Number(i64),
    Text(String),
}

/// A manual fleet entry: a bare capacity or `{ capacidad, guia }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManualBusWire {
    Capacity(i64),
    Detailed {
        capacidad: i64,
        #[serde(default)]
        guia: Option<String>,
    },
}

impl From<ManualBusWire> for ManualBus {
    fn from(wire: ManualBusWire) -> Self {
        match wire {
            ManualBusWire::Capacity(capacity) => ManualBus { capacity, guide: None },
            ManualBusWire::Detailed { capacidad, guia } => ManualBus {
                capacity: capacidad,
                guide: guia,
            },
        }
    }
}

impl TryFrom<PlanRequestBody> for PlanRequest {
    type Error = PlanningError;

    fn try_from(body: PlanRequestBody) -> Result<Self, Self::Error> {
        let invalid = |detail: &str| PlanningError::InvalidRequest(detail.to_string());

        let raw_date = body.fecha.ok_or_else(|| invalid("falta la fecha"))?;
        let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d").map_err(|_| {
            PlanningError::InvalidRequest(format!("fecha inválida {raw_date:?}, se espera AAAA-MM-DD"))
        })?;

        let tour_id = match body.tour_id.ok_or_else(|| invalid("falta idTour"))? {
            WireTourId::Number(id) => Some(id),
            WireTourId::Text(text) => text.trim().parse().ok(),
        }
        .filter(|id| *id > 0)
        .ok_or_else(|| invalid("idTour debe ser un entero positivo"))?;

        match body.manual_fleet {
            None if body.anchors.as_ref().is_some_and(|a| !a.is_empty()) => {
                Err(invalid("reservasAncladas requiere flotaManual"))
            }
            None => Ok(Self::Automatic { tour_id, date }),
            Some(entries) => {
                let manual: Vec<ManualBus> = entries.into_iter().map(ManualBus::from).collect();
                let fleet = FleetPlanner::accept(&manual)?;
                Ok(Self::Assisted {
                    tour_id,
                    date,
                    fleet,
                    anchors: body.anchors.unwrap_or_default(),
                })
            }
        }
    }
}
