//! Form-encoded key/value payloads.
//!
//! Devices push telemetry as `application/x-www-form-urlencoded` bodies or
//! query strings. Decoding is strict about escapes: a `%` must be followed by
//! two hex digits and the decoded bytes must be UTF-8, otherwise the whole
//! payload is rejected.

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors that can occur while decoding a form payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// A `%` escape was truncated or not followed by hex digits.
    #[error("invalid percent escape at byte {0}")]
    InvalidEscape(usize),

    /// The decoded bytes are not valid UTF-8.
    #[error("form field is not valid UTF-8")]
    InvalidUtf8,
}

/// Decoded form fields, each key mapping to its values in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `&`-separated list of `key=value` pairs.
    ///
    /// A pair without `=` is a key with an empty value. Empty segments are
    /// ignored.
    pub fn parse(input: &str) -> Result<Self, FormError> {
        let mut payload = Self::new();
        let mut offset = 0;

        for segment in input.split('&') {
            let start = offset;
            offset += segment.len() + 1;

            if segment.is_empty() {
                continue;
            }

            let (raw_key, raw_value, value_start) = match segment.split_once('=') {
                Some((k, v)) => (k, v, start + k.len() + 1),
                None => (segment, "", start + segment.len()),
            };

            let key = decode_component(raw_key, start)?;
            let value = decode_component(raw_value, value_start)?;
            payload.insert(key, value);
        }

        Ok(payload)
    }

    /// Add one value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(key.into()).or_default().push(value.into());
    }

    /// Append all values of `other` after the values already held.
    pub fn extend(&mut self, other: FormPayload) {
        for (key, values) in other.fields {
            self.fields.entry(key).or_default().extend(values);
        }
    }

    /// First value for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key`.
    pub fn values(&self, key: &str) -> &[String] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value for `key` parsed as a finite number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.first(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

fn decode_component(raw: &str, base: usize) -> Result<String, FormError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|b| hex_value(*b));
                let lo = bytes.get(i + 2).and_then(|b| hex_value(*b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
                    _ => return Err(FormError::InvalidEscape(base + i)),
                }
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| FormError::InvalidUtf8)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_pairs() {
        let form = FormPayload::parse("tempf=70.5&humidity=45&model=GW1000").unwrap();

        assert_eq!(form.first("tempf"), Some("70.5"));
        assert_eq!(form.number("humidity"), Some(45.0));
        assert_eq!(form.first("model"), Some("GW1000"));
        assert_eq!(form.len(), 3);
    }

    #[test]
    fn test_parse_escapes_and_plus() {
        let form = FormPayload::parse("stationtype=EasyWeather+V1.6%2E4&dateutc=2024-01-17%2010:00:00").unwrap();

        assert_eq!(form.first("stationtype"), Some("EasyWeather V1.6.4"));
        assert_eq!(form.first("dateutc"), Some("2024-01-17 10:00:00"));
    }

    #[test]
    fn test_first_value_wins() {
        let form = FormPayload::parse("tempf=70&tempf=80").unwrap();

        assert_eq!(form.first("tempf"), Some("70"));
        assert_eq!(form.values("tempf"), &["70".to_string(), "80".to_string()]);
    }

    #[test]
    fn test_keys_without_values_and_empty_segments() {
        let form = FormPayload::parse("&&flag&tempf=&x=1&").unwrap();

        assert_eq!(form.first("flag"), Some(""));
        assert_eq!(form.first("tempf"), Some(""));
        assert_eq!(form.number("tempf"), None);
        assert_eq!(form.number("x"), Some(1.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(FormPayload::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_escape_rejected() {
        assert_eq!(
            FormPayload::parse("tempf=%zz"),
            Err(FormError::InvalidEscape(6))
        );
        assert_eq!(
            FormPayload::parse("a=1&tempf=7%"),
            Err(FormError::InvalidEscape(11))
        );
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert_eq!(FormPayload::parse("name=%ff%fe"), Err(FormError::InvalidUtf8));
    }

    #[test]
    fn test_number_rejects_garbage_and_non_finite() {
        let form = FormPayload::parse("a=abc&b=NaN&c=inf&d=%2012.5%20").unwrap();

        assert_eq!(form.number("a"), None);
        assert_eq!(form.number("b"), None);
        assert_eq!(form.number("c"), None);
        assert_eq!(form.number("d"), Some(12.5));
        assert_eq!(form.number("missing"), None);
    }

    #[test]
    fn test_extend_keeps_existing_first() {
        let mut body = FormPayload::parse("tempf=70").unwrap();
        let query = FormPayload::parse("tempf=99&uv=3").unwrap();
        body.extend(query);

        assert_eq!(body.first("tempf"), Some("70"));
        assert_eq!(body.first("uv"), Some("3"));
    }
}
