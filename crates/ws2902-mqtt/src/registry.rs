//! Fixed table of station fields we republish.

use crate::sensor::{SensorDescriptor, Transform};
use crate::units::Unit;
use std::collections::HashMap;

/// Station query parameters, in publish order.
pub mod fields {
    pub const STATION_TYPE: &str = "stationtype";
    pub const PASSKEY: &str = "PASSKEY";
    pub const DATE_UTC: &str = "dateutc";
    pub const TEMP_INDOOR_F: &str = "tempinf";
    pub const HUMIDITY_INDOOR: &str = "humidityin";
    pub const BAROM_REL_IN: &str = "baromrelin";
    pub const BAROM_ABS_IN: &str = "baromabsin";
    pub const TEMP_F: &str = "tempf";
    pub const HUMIDITY: &str = "humidity";
    pub const WIND_DIR: &str = "winddir";
    pub const WIND_SPEED_MPH: &str = "windspeedmph";
    pub const WIND_GUST_MPH: &str = "windgustmph";
    pub const MAX_DAILY_GUST: &str = "maxdailygust";
    pub const HOURLY_RAIN_IN: &str = "hourlyrainin";
    pub const EVENT_RAIN_IN: &str = "eventrainin";
    pub const DAILY_RAIN_IN: &str = "dailyrainin";
    pub const WEEKLY_RAIN_IN: &str = "weeklyrainin";
    pub const MONTHLY_RAIN_IN: &str = "monthlyrainin";
    pub const TOTAL_RAIN_IN: &str = "totalrainin";
    pub const SOLAR_RADIATION: &str = "solarradiation";
    pub const UV: &str = "uv";
}

fn ws2902_sensors() -> Vec<(&'static str, SensorDescriptor)> {
    use fields::*;

    vec![
        (STATION_TYPE, SensorDescriptor::new("Station Type")),
        (PASSKEY, SensorDescriptor::new("MAC Address")),
        (
            DATE_UTC,
            SensorDescriptor::new("Last Update")
                .with_device_class("timestamp")
                .with_transform(Transform::UtcTimestamp),
        ),
        (
            TEMP_INDOOR_F,
            SensorDescriptor::new("Indoor Temperature")
                .with_unit(Unit::DegreesFahrenheit)
                .with_device_class("temperature"),
        ),
        (
            HUMIDITY_INDOOR,
            SensorDescriptor::new("Indoor Humidity")
                .with_unit(Unit::PercentRelativeHumidity)
                .with_device_class("humidity"),
        ),
        (
            BAROM_REL_IN,
            SensorDescriptor::new("Barometer (relative)")
                .with_unit(Unit::InchesOfMercury)
                .with_device_class("pressure"),
        ),
        (
            BAROM_ABS_IN,
            SensorDescriptor::new("Barometer (absolute)")
                .with_unit(Unit::InchesOfMercury)
                .with_device_class("pressure"),
        ),
        (
            TEMP_F,
            SensorDescriptor::new("Temperature")
                .with_unit(Unit::DegreesFahrenheit)
                .with_device_class("temperature"),
        ),
        (
            HUMIDITY,
            SensorDescriptor::new("Humidity")
                .with_unit(Unit::PercentRelativeHumidity)
                .with_device_class("humidity"),
        ),
        (
            WIND_DIR,
            SensorDescriptor::new("Wind Direction").with_unit(Unit::Degrees),
        ),
        (
            WIND_SPEED_MPH,
            SensorDescriptor::new("Wind Speed").with_unit(Unit::MilesPerHour),
        ),
        (
            WIND_GUST_MPH,
            SensorDescriptor::new("Wind Gust").with_unit(Unit::MilesPerHour),
        ),
        (
            MAX_DAILY_GUST,
            SensorDescriptor::new("Max Wind Gust").with_unit(Unit::MilesPerHour),
        ),
        (
            HOURLY_RAIN_IN,
            SensorDescriptor::new("Hourly Rain").with_unit(Unit::Inches),
        ),
        (
            EVENT_RAIN_IN,
            SensorDescriptor::new("Event Rain").with_unit(Unit::Inches),
        ),
        (
            DAILY_RAIN_IN,
            SensorDescriptor::new("Daily Rain").with_unit(Unit::Inches),
        ),
        (
            WEEKLY_RAIN_IN,
            SensorDescriptor::new("Weekly Rain").with_unit(Unit::Inches),
        ),
        (
            MONTHLY_RAIN_IN,
            SensorDescriptor::new("Monthly Rain").with_unit(Unit::Inches),
        ),
        (
            TOTAL_RAIN_IN,
            SensorDescriptor::new("Total Rain").with_unit(Unit::Inches),
        ),
        (
            SOLAR_RADIATION,
            SensorDescriptor::new("Solar Radiation").with_unit(Unit::WattsPerSquareMeter),
        ),
        (UV, SensorDescriptor::new("UV Index")),
    ]
}

/// Immutable field-name → descriptor table, built once at startup.
///
/// Only the descriptors' config latches change after construction, so a
/// single instance is shared by reference across all request handlers.
#[derive(Debug)]
pub struct SensorRegistry {
    entries: Vec<(&'static str, SensorDescriptor)>,
    index: HashMap<&'static str, usize>,
}

impl SensorRegistry {
    /// Registry for the WS-2902 custom-server upload format.
    pub fn ws2902() -> Self {
        Self::from_entries(ws2902_sensors())
    }

    fn from_entries(entries: Vec<(&'static str, SensorDescriptor)>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (field, _))| (*field, i))
            .collect();
        Self { entries, index }
    }

    /// Exact, case-sensitive lookup of a station field.
    pub fn lookup(&self, field: &str) -> Option<&SensorDescriptor> {
        self.index.get(field).map(|&i| &self.entries[i].1)
    }

    /// Entries in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SensorDescriptor)> {
        self.entries.iter().map(|(field, sensor)| (*field, sensor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::ws2902()
    }
}
