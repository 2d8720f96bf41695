//! Units of measurement reported by the station.

use serde::{Serialize, Serializer};
use std::fmt;

/// Unit symbol attached to a sensor's discovery config.
///
/// Serializes to the literal symbol Home Assistant expects in
/// `unit_of_measurement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    DegreesFahrenheit,
    DegreesCelsius,
    PercentRelativeHumidity,
    InchesOfMercury,
    Degrees,
    MilesPerHour,
    Inches,
    WattsPerSquareMeter,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::DegreesFahrenheit => "°F",
            Unit::DegreesCelsius => "°C",
            Unit::PercentRelativeHumidity => "%",
            Unit::InchesOfMercury => "inHg",
            Unit::Degrees => "°",
            Unit::MilesPerHour => "MPH",
            Unit::Inches => "in",
            Unit::WattsPerSquareMeter => "W/m²",
        }
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Unit; 8] = [
        Unit::DegreesFahrenheit,
        Unit::DegreesCelsius,
        Unit::PercentRelativeHumidity,
        Unit::InchesOfMercury,
        Unit::Degrees,
        Unit::MilesPerHour,
        Unit::Inches,
        Unit::WattsPerSquareMeter,
    ];

    #[test]
    fn test_serialized_form_matches_symbol() {
        for unit in ALL {
            let json = serde_json::to_string(&unit).unwrap();
            assert_eq!(json, format!("\"{}\"", unit.symbol()));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Unit::DegreesFahrenheit.to_string(), "°F");
        assert_eq!(Unit::WattsPerSquareMeter.to_string(), "W/m²");
    }
}
