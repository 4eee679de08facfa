//! Coordinate and address types shared by the providers.

use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon degrees).
///
/// Serializes as a two-element `[lat, lon]` array, the cache wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl From<[f64; 2]> for Coordinate {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[0],
            lon: pair[1],
        }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lat, c.lon]
    }
}

/// Address registered for a CEP in the postal registry.
///
/// Fields the registry omits are empty strings. A CEP absent from the
/// registry altogether yields no `ResolvedAddress` at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl ResolvedAddress {
    /// Free-text query for the geocoding search stage.
    pub fn query_string(&self) -> String {
        format!(
            "{}, {}, {}, {}, Brazil",
            self.street, self.neighborhood, self.city, self.state
        )
    }
}
