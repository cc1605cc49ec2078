//! Line protocol encoding for point writes
//!
//! # Escaping
//!
//! - Measurement: escape `,`, ` ` (space)
//! - Field keys: escape `,`, `=`, ` ` (space)
//!
//! Field values are always floats, so no string value escaping is needed.

use crate::types::Sample;

/// Escape a measurement name
pub fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

/// Escape a field key
pub fn escape_key(key: &str) -> String {
    escape(key, &[',', '=', ' '])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

/// Encode one sample as a line with millisecond precision
///
/// ```text
/// readings temperatura=21.5,humedad=40 1756720800000
/// ```
pub fn encode_sample(
    measurement: &str,
    temperature_field: &str,
    humidity_field: &str,
    sample: &Sample,
) -> String {
    format!(
        "{} {}={},{}={} {}",
        escape_measurement(measurement),
        escape_key(temperature_field),
        sample.temperature,
        escape_key(humidity_field),
        sample.humidity,
        sample.ts.timestamp_millis()
    )
}
