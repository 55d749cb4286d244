//! Unit conversions between the imperial units reported by station hardware
//! and the SI units used throughout the data model.

/// Hectopascals per inch of mercury.
pub const HPA_PER_INHG: f64 = 33.86389;

/// Metres per second in one mile per hour.
pub const MS_PER_MPH: f64 = 0.44704;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn inhg_to_hpa(inhg: f64) -> f64 {
    inhg * HPA_PER_INHG
}

pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa / HPA_PER_INHG
}

pub fn mph_to_ms(mph: f64) -> f64 {
    mph * MS_PER_MPH
}

pub fn ms_to_mph(ms: f64) -> f64 {
    ms / MS_PER_MPH
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}
