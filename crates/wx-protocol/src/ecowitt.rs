//! Ecowitt device protocol adapter.
//!
//! Ecowitt gateways (GW1000, GW2000, HP2551 consoles, ...) push imperial
//! units as form fields using the "customized upload" protocol. Missing or
//! unparseable fields become zero so a partial payload from flaky hardware
//! still produces a reading.

use chrono::{DateTime, Utc};
use wx_core::units::{fahrenheit_to_celsius, inhg_to_hpa, mph_to_ms};
use wx_core::{Measurements, Reading};

use crate::form::FormPayload;

/// Field names used by the Ecowitt upload protocol.
pub mod fields {
    pub const TEMPERATURE_F: &str = "tempf";
    pub const HUMIDITY: &str = "humidity";
    pub const PRESSURE_ABS_INHG: &str = "baromabsin";
    pub const WIND_SPEED_MPH: &str = "windspeedmph";
    pub const WIND_DIRECTION: &str = "winddir";
    pub const RAIN_RATE_IN: &str = "rainratein";
    pub const UV: &str = "uv";
}

/// Device protocols the collector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Ecowitt,
}

impl DeviceKind {
    /// Look up a device kind by its configured name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.trim().eq_ignore_ascii_case("ecowitt") {
            Some(DeviceKind::Ecowitt)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Ecowitt => "ecowitt",
        }
    }

    /// Convert a payload from this device into a reading stamped `timestamp`.
    pub fn to_reading(&self, payload: &FormPayload, timestamp: DateTime<Utc>) -> Reading {
        match self {
            DeviceKind::Ecowitt => Reading::new(timestamp, measurements(payload)),
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract SI measurements from an Ecowitt payload.
pub fn measurements(payload: &FormPayload) -> Measurements {
    let field = |key: &str| payload.number(key);

    Measurements {
        temperature: field(fields::TEMPERATURE_F)
            .map(fahrenheit_to_celsius)
            .unwrap_or(0.0),
        humidity: field(fields::HUMIDITY).unwrap_or(0.0),
        pressure: field(fields::PRESSURE_ABS_INHG)
            .map(inhg_to_hpa)
            .unwrap_or(0.0),
        wind_speed: field(fields::WIND_SPEED_MPH).map(mph_to_ms).unwrap_or(0.0),
        wind_direction: field(fields::WIND_DIRECTION).unwrap_or(0.0),
        // Passed through in the unit the station reports.
        rain: field(fields::RAIN_RATE_IN).unwrap_or(0.0),
        uv_index: field(fields::UV).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap()
    }

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_device_kind_from_name() {
        assert_eq!(DeviceKind::from_name("ecowitt"), Some(DeviceKind::Ecowitt));
        assert_eq!(DeviceKind::from_name("EcoWitt"), Some(DeviceKind::Ecowitt));
        assert_eq!(DeviceKind::from_name("davis"), None);
        assert_eq!(DeviceKind::from_name(""), None);
    }

    #[test]
    fn test_full_payload_conversions() {
        let payload = FormPayload::parse(
            "PASSKEY=ABC&stationtype=GW1000B_V1.6.8&tempf=70.5&humidity=45&baromabsin=29.92\
             &windspeedmph=5.5&winddir=180&rainratein=0.12&uv=5",
        )
        .unwrap();
        let reading = DeviceKind::Ecowitt.to_reading(&payload, now());

        assert!(approx(reading.temperature(), 21.3889, 1e-3));
        assert!(approx(reading.pressure(), 1013.2076, 1e-3));
        assert!(approx(reading.wind_speed(), 2.45872, 1e-4));
        assert_eq!(reading.wind_direction(), 180.0);
        assert_eq!(reading.humidity(), 45.0);
        assert_eq!(reading.rain(), 0.12);
        assert_eq!(reading.uv_index(), 5.0);
        assert_eq!(reading.timestamp(), now());
    }

    #[test]
    fn test_missing_and_garbage_fields_default_to_zero() {
        let payload = FormPayload::parse("tempf=20&humidity=&windspeedmph=25&uv=high").unwrap();
        let m = measurements(&payload);

        assert!(approx(m.temperature, -6.6667, 1e-3));
        assert_eq!(m.humidity, 0.0);
        assert_eq!(m.pressure, 0.0);
        assert_eq!(m.uv_index, 0.0);
        assert!(approx(m.wind_speed, 11.176, 1e-6));
    }

    #[test]
    fn test_cold_windy_payload_has_wind_chill() {
        let payload = FormPayload::parse("tempf=20&windspeedmph=25").unwrap();
        let reading = DeviceKind::Ecowitt.to_reading(&payload, now());

        assert!(reading.wind_chill() < reading.temperature());
    }
}
