//! Weather data model types.
//!
//! A [`Reading`] is one timestamped observation: the primary
//! [`Measurements`] reported by the station plus the [`DerivedMetrics`]
//! computed from them. Readings are immutable once built; changing a
//! primary value means building a new reading, which recomputes every
//! derived value from the same snapshot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::derived::DerivedMetrics;

/// Primary measurements, in SI units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Measurements {
    /// Air temperature (°C)
    pub temperature: f64,
    /// Relative humidity (0-100 %)
    pub humidity: f64,
    /// Barometric pressure (hPa)
    pub pressure: f64,
    /// Wind speed (m/s)
    pub wind_speed: f64,
    /// Wind direction (degrees, 0-359)
    pub wind_direction: f64,
    /// Rain rate, in the unit reported by the station
    pub rain: f64,
    /// UV index
    pub uv_index: f64,
}

impl Measurements {
    /// Bring values into the ranges the data model guarantees.
    ///
    /// Non-finite values become zero, humidity is clamped to [0, 100], wind
    /// direction is wrapped into [0, 360) and UV index is floored at zero.
    pub fn sanitized(self) -> Self {
        fn finite(v: f64) -> f64 {
            if v.is_finite() {
                v
            } else {
                0.0
            }
        }

        Self {
            temperature: finite(self.temperature),
            humidity: finite(self.humidity).clamp(0.0, 100.0),
            pressure: finite(self.pressure),
            wind_speed: finite(self.wind_speed),
            wind_direction: wrap_degrees(finite(self.wind_direction)),
            rain: finite(self.rain),
            uv_index: finite(self.uv_index).max(0.0),
        }
    }
}

/// Wrap an angle into [0, 360).
fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // Tiny negative inputs round up to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// One weather observation with its derived values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "ReadingRecord", from = "ReadingRecord")]
pub struct Reading {
    timestamp: DateTime<Utc>,
    measurements: Measurements,
    derived: DerivedMetrics,
}

impl Reading {
    /// Build a reading, sanitising the measurements and computing all
    /// derived values from them.
    pub fn new(timestamp: DateTime<Utc>, measurements: Measurements) -> Self {
        let measurements = measurements.sanitized();
        Self {
            timestamp,
            measurements,
            derived: DerivedMetrics::compute(&measurements),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    pub fn derived(&self) -> &DerivedMetrics {
        &self.derived
    }

    /// Age of the reading relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    pub fn temperature(&self) -> f64 {
        self.measurements.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.measurements.humidity
    }

    pub fn pressure(&self) -> f64 {
        self.measurements.pressure
    }

    pub fn wind_speed(&self) -> f64 {
        self.measurements.wind_speed
    }

    pub fn wind_direction(&self) -> f64 {
        self.measurements.wind_direction
    }

    pub fn rain(&self) -> f64 {
        self.measurements.rain
    }

    pub fn uv_index(&self) -> f64 {
        self.measurements.uv_index
    }

    pub fn dew_point(&self) -> f64 {
        self.derived.dew_point
    }

    pub fn wind_chill(&self) -> f64 {
        self.derived.wind_chill
    }

    pub fn heat_index(&self) -> f64 {
        self.derived.heat_index
    }

    pub fn cloud_base(&self) -> f64 {
        self.derived.cloud_base
    }
}

/// Flat serialized form of a [`Reading`].
///
/// Derived fields are written for consumers but ignored when reading back:
/// they are always recomputed from the primary fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingRecord {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    measurements: Measurements,
    #[serde(default, skip_deserializing)]
    cloud_base: f64,
    #[serde(default, skip_deserializing)]
    dew_point: f64,
    #[serde(default, skip_deserializing)]
    wind_chill: f64,
    #[serde(default, skip_deserializing)]
    heat_index: f64,
}

impl From<Reading> for ReadingRecord {
    fn from(r: Reading) -> Self {
        Self {
            timestamp: r.timestamp,
            measurements: r.measurements,
            cloud_base: r.derived.cloud_base,
            dew_point: r.derived.dew_point,
            wind_chill: r.derived.wind_chill,
            heat_index: r.derived.heat_index,
        }
    }
}

impl From<ReadingRecord> for Reading {
    fn from(record: ReadingRecord) -> Self {
        Reading::new(record.timestamp, record.measurements)
    }
}

/// Metadata describing the weather station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Altitude in metres
    #[serde(default)]
    pub altitude: f64,
}
