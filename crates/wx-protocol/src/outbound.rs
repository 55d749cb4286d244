//! Outbound publisher payloads.
//!
//! - [`CustomPayload`]: JSON body for user-configured HTTP endpoints, using
//!   snake_case field names and SI units as stored.
//! - [`WundergroundUpload`]: query parameters for the Weather Underground
//!   PWS upload protocol, in imperial units.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use wx_core::units::{celsius_to_fahrenheit, hpa_to_inhg, mm_to_inches, ms_to_mph};
use wx_core::Reading;

/// Default Weather Underground upload endpoint.
pub const WUNDERGROUND_URL: &str =
    "https://weatherstation.wunderground.com/weatherstation/updateweatherstation.php";

/// JSON body sent to custom endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPayload {
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub rain: f64,
    pub uv_index: f64,
    pub dew_point: f64,
    pub wind_chill: f64,
    pub heat_index: f64,
}

impl CustomPayload {
    /// Parse the timestamp back into an instant.
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.timestamp).map(|t| t.with_timezone(&Utc))
    }
}

impl From<&Reading> for CustomPayload {
    fn from(r: &Reading) -> Self {
        Self {
            timestamp: r.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            temperature: r.temperature(),
            humidity: r.humidity(),
            pressure: r.pressure(),
            wind_speed: r.wind_speed(),
            wind_direction: r.wind_direction(),
            rain: r.rain(),
            uv_index: r.uv_index(),
            dew_point: r.dew_point(),
            wind_chill: r.wind_chill(),
            heat_index: r.heat_index(),
        }
    }
}

/// Weather Underground station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WundergroundUpload {
    pub station_id: String,
    pub api_key: String,
}

impl WundergroundUpload {
    pub fn new(station_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Query parameters for an `updateraw` request carrying `reading`.
    ///
    /// `UV` is only included when the UV index is positive.
    pub fn query(&self, reading: &Reading) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ID", self.station_id.clone()),
            ("PASSWORD", self.api_key.clone()),
            (
                "dateutc",
                reading.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("action", "updateraw".to_string()),
            (
                "tempf",
                format!("{:.1}", celsius_to_fahrenheit(reading.temperature())),
            ),
            ("humidity", format!("{:.1}", reading.humidity())),
            ("baromin", format!("{:.3}", hpa_to_inhg(reading.pressure()))),
            (
                "windspeedmph",
                format!("{:.1}", ms_to_mph(reading.wind_speed())),
            ),
            ("winddir", format!("{:.0}", reading.wind_direction())),
            ("rainin", format!("{:.2}", mm_to_inches(reading.rain()))),
            (
                "dewptf",
                format!("{:.1}", celsius_to_fahrenheit(reading.dew_point())),
            ),
        ];

        if reading.uv_index() > 0.0 {
            params.push(("UV", format!("{:.1}", reading.uv_index())));
        }

        params
    }
}
