//! Medellín pickup points used by the tour operator.
//!
//! Coordinates taken from OpenStreetMap; routable with the Colombia OSRM
//! extract.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// El Poblado hotels (close to the operations base)
// ============================================================================

pub const POBLADO: &[Location] = &[
    Location::new("Parque El Poblado", 6.2103, -75.5704),
    Location::new("Parque Lleras", 6.2087, -75.5675),
    Location::new("Provenza", 6.2098, -75.5659),
    Location::new("Hotel Dann Carlton", 6.2095, -75.5710),
    Location::new("Hotel InterContinental", 6.2005, -75.5637),
    Location::new("Hotel Estelar Milla de Oro", 6.2018, -75.5722),
];

// ============================================================================
// Laureles / Estadio
// ============================================================================

pub const LAURELES: &[Location] = &[
    Location::new("Primer Parque de Laureles", 6.2446, -75.5900),
    Location::new("Segundo Parque de Laureles", 6.2471, -75.5947),
    Location::new("Estadio Atanasio Girardot", 6.2566, -75.5901),
];

// ============================================================================
// Centro and the south
// ============================================================================

pub const CENTRO: &[Location] = &[
    Location::new("Plaza Botero", 6.2520, -75.5686),
    Location::new("Parque Berrío", 6.2500, -75.5683),
    Location::new("Pueblito Paisa", 6.2367, -75.5790),
];

pub const ENVIGADO: &[Location] = &[Location::new("Parque de Envigado", 6.1710, -75.5866)];

/// Every fixture location, Poblado first.
pub fn all_locations() -> Vec<Location> {
    POBLADO
        .iter()
        .chain(LAURELES)
        .chain(CENTRO)
        .chain(ENVIGADO)
        .cloned()
        .collect()
}
