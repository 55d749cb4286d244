//! Derived meteorological values.
//!
//! Dew point, wind chill, heat index and cloud base are computed from a
//! single [`Measurements`] snapshot. They are always produced together by
//! [`DerivedMetrics::compute`] so a reading can never mix derived values from
//! different primary snapshots.
//!
//! The wind chill and heat index formulas are the NWS ones, which work in
//! °F and mph; inputs are converted from SI and results converted back.

use serde::{Deserialize, Serialize};

use crate::model::Measurements;
use crate::units::{celsius_to_fahrenheit, fahrenheit_to_celsius, ms_to_mph};

/// Magnus coefficients.
const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

/// Below this relative humidity (%) the Magnus formula is unreliable.
const LOW_HUMIDITY_LIMIT: f64 = 10.0;

/// Metres of cloud base per °C of dew point spread.
const CLOUD_BASE_M_PER_C: f64 = 122.0;

/// Wind chill applies at or below this temperature (°F)...
const WIND_CHILL_MAX_TEMP_F: f64 = 50.0;
/// ...and at or above this wind speed (mph).
const WIND_CHILL_MIN_WIND_MPH: f64 = 3.0;

/// Heat index applies at or above this temperature (°F).
const HEAT_INDEX_MIN_TEMP_F: f64 = 80.0;

/// Values computed from the primary measurements of a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    /// Dew point (°C).
    pub dew_point: f64,
    /// Wind chill (°C). Equal to the ambient temperature when not applicable.
    pub wind_chill: f64,
    /// Heat index (°C). Equal to the ambient temperature when not applicable.
    pub heat_index: f64,
    /// Estimated cloud base (m).
    pub cloud_base: f64,
}

impl DerivedMetrics {
    /// Compute all derived values from one measurement snapshot.
    pub fn compute(m: &Measurements) -> Self {
        let dew_point = dew_point(m.temperature, m.humidity);

        Self {
            dew_point,
            wind_chill: wind_chill(m.temperature, m.wind_speed),
            heat_index: heat_index(m.temperature, m.humidity),
            cloud_base: cloud_base(m.temperature, m.humidity, dew_point),
        }
    }
}

/// Dew point (°C) from temperature (°C) and relative humidity (%).
///
/// At or below 10% humidity the linear approximation `T - (100 - H) / 5` is
/// also evaluated and the larger value wins. `f64::max` ignores a NaN
/// operand, which covers the Magnus formula breaking down at 0%.
pub fn dew_point(temp_c: f64, humidity: f64) -> f64 {
    let alpha = (MAGNUS_A * temp_c) / (MAGNUS_B + temp_c) + (humidity / 100.0).ln();
    let magnus = (MAGNUS_B * alpha) / (MAGNUS_A - alpha);

    if humidity <= LOW_HUMIDITY_LIMIT {
        let linear = temp_c - (100.0 - humidity) / 5.0;
        return magnus.max(linear);
    }

    magnus
}

/// Wind chill (°C) from temperature (°C) and wind speed (m/s).
///
/// Returns `temp_c` unchanged outside the NWS validity range.
pub fn wind_chill(temp_c: f64, wind_speed_ms: f64) -> f64 {
    let temp_f = celsius_to_fahrenheit(temp_c);
    let wind_mph = ms_to_mph(wind_speed_ms);

    if temp_f <= WIND_CHILL_MAX_TEMP_F && wind_mph >= WIND_CHILL_MIN_WIND_MPH {
        fahrenheit_to_celsius(wind_chill_f(temp_f, wind_mph))
    } else {
        temp_c
    }
}

/// NWS (2001) wind chill in °F.
///
/// Below 15°F with wind above 20 mph an extra empirical correction of
/// `-1.5 * (20 / T) * (v / 20)` is applied. The correction is undefined at
/// exactly 0°F and is skipped there.
pub fn wind_chill_f(temp_f: f64, wind_mph: f64) -> f64 {
    let v = wind_mph.powf(0.16);
    let mut chill = 35.74 + 0.6215 * temp_f - 35.75 * v + 0.4275 * temp_f * v;

    if temp_f < 15.0 && wind_mph > 20.0 && temp_f != 0.0 {
        chill += -1.5 * (20.0 / temp_f) * (wind_mph / 20.0);
    }

    chill
}

/// Heat index (°C) from temperature (°C) and relative humidity (%).
///
/// Returns `temp_c` unchanged below 80°F.
pub fn heat_index(temp_c: f64, humidity: f64) -> f64 {
    let temp_f = celsius_to_fahrenheit(temp_c);

    if temp_f >= HEAT_INDEX_MIN_TEMP_F {
        fahrenheit_to_celsius(heat_index_f(temp_f, humidity))
    } else {
        temp_c
    }
}

/// Heat index in °F: Rothfusz regression with the NWS humidity adjustments.
pub fn heat_index_f(temp_f: f64, humidity: f64) -> f64 {
    let t = temp_f;
    let h = humidity;
    let mut hi = rothfusz(t, h);

    if h < 13.0 && t > 80.0 && t < 112.0 {
        hi -= ((13.0 - h) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    } else if h > 85.0 && t > 80.0 && t < 87.0 {
        hi += ((h - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }

    // Compress the top of the scale for extreme heat and humidity.
    if t >= 95.0 && h >= 80.0 && hi > 160.0 {
        hi = 160.0 + (hi - 160.0) * 0.5;
    }

    hi
}

fn rothfusz(t: f64, h: f64) -> f64 {
    const C1: f64 = -42.379;
    const C2: f64 = 2.049_015_23;
    const C3: f64 = 10.143_331_27;
    const C4: f64 = -0.224_755_41;
    const C5: f64 = -0.006_837_83;
    const C6: f64 = -0.054_817_17;
    const C7: f64 = 0.001_228_74;
    const C8: f64 = 0.000_852_82;
    const C9: f64 = -0.000_001_99;

    C1 + C2 * t
        + C3 * h
        + C4 * t * h
        + C5 * t * t
        + C6 * h * h
        + C7 * t * t * h
        + C8 * t * h * h
        + C9 * t * t * h * h
}

/// Cloud base (m); zero when humidity is unknown.
pub fn cloud_base(temp_c: f64, humidity: f64, dew_point: f64) -> f64 {
    if humidity > 0.0 {
        CLOUD_BASE_M_PER_C * (temp_c - dew_point)
    } else {
        0.0
    }
}
