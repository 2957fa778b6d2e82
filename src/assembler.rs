//! Packages ranked suggestions into the response returned to the operator.

use crate::model::{Analysis, Plan, PlanMode, Suggestion};

pub const NO_PASSENGERS: &str = "No hay pasajeros para planificar.";

/// Builds the plan. Assisted mode expects a single suggestion and also
/// exposes it as `plan`.
pub fn assemble(analysis: Analysis, ranked: Vec<Suggestion>, mode: PlanMode, warnings: Vec<String>) -> Plan {
    let message = match ranked.first() {
        Some(best) if analysis.total_reservations > 0 => coverage_message(&analysis, best, mode),
        _ => NO_PASSENGERS.to_string(),
    };

    let plan = match mode {
        PlanMode::Assisted => ranked.first().cloned(),
        PlanMode::Automatic => None,
    };

    Plan {
        analysis,
        suggestions: ranked,
        message,
        warnings,
        plan,
    }
}

/// Coverage summary of the best suggestion.
fn coverage_message(analysis: &Analysis, best: &Suggestion, mode: PlanMode) -> String {
    let mut message = if best.unassigned.is_empty() {
        format!(
            "Todos los pasajeros ({}) quedaron asignados en {} {}.",
            analysis.total_passengers,
            best.total_buses,
            plural(best.total_buses, "bus", "buses")
        )
    } else {
        format!(
            "Asignación incompleta: {} {} ({} {}) sin asignar.",
            best.unassigned.len(),
            plural(best.unassigned.len(), "reserva", "reservas"),
            best.unassigned_passengers(),
            plural(best.unassigned_passengers() as usize, "pasajero", "pasajeros")
        )
    };

    if mode == PlanMode::Assisted && best.total_capacity < analysis.total_passengers {
        message.push_str(&format!(
            " La flota declarada ofrece {} puestos para {} pasajeros; faltan {}.",
            best.total_capacity,
            analysis.total_passengers,
            analysis.total_passengers - best.total_capacity
        ));
    }

    if !analysis.missing_coordinates.is_empty() {
        message.push_str(&format!(
            " {} {} sin coordenadas; el recorrido no las incluye.",
            analysis.missing_coordinates.len(),
            plural(analysis.missing_coordinates.len(), "reserva", "reservas")
        ));
    }

    message
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Point, Reservation, Strategy};

    fn analysis(passengers: u32, reservations: usize) -> Analysis {
        Analysis {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            tour_id: 1,
            total_passengers: passengers,
            total_reservations: reservations,
            missing_coordinates: Vec::new(),
        }
    }

    fn suggestion(total_capacity: u32, unassigned: Vec<Reservation>) -> Suggestion {
        Suggestion {
            combination: vec![total_capacity],
            buses: Vec::new(),
            total_km: 0.0,
            average_occupancy: 0.0,
            total_buses: 1,
            unassigned,
            strategy: Strategy::Manual,
            total_capacity,
        }
    }

    #[test]
    fn test_full_coverage_message() {
        let plan = assemble(analysis(30, 3), vec![suggestion(40, Vec::new())], PlanMode::Automatic, Vec::new());
        assert_eq!(plan.message, "Todos los pasajeros (30) quedaron asignados en 1 bus.");
        assert!(plan.plan.is_none());
    }

    #[test]
    fn test_assisted_reports_shortfall_and_exposes_plan() {
        let big = Reservation::new("r1", 50, Point::new(1, "p", Some(6.2), Some(-75.5)));
        let plan = assemble(analysis(50, 1), vec![suggestion(40, vec![big])], PlanMode::Assisted, Vec::new());
        assert!(plan.message.starts_with("Asignación incompleta: 1 reserva (50 pasajeros)"));
        assert!(plan.message.contains("faltan 10"));
        assert_eq!(plan.plan.as_ref(), plan.suggestions.first());
    }

    #[test]
    fn test_empty_analysis_says_no_passengers() {
        let plan = assemble(analysis(0, 0), vec![suggestion(0, Vec::new())], PlanMode::Automatic, Vec::new());
        assert_eq!(plan.message, NO_PASSENGERS);
    }
}
