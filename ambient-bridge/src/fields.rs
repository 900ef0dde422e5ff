//! Field classification for station report keys.
//!
//! Static tables, independent of configuration and of the catalog.

use crate::error::BridgeError;

/// Station identity, station type and capture timestamp. Republished raw,
/// excluded from discovery and from the time-series point.
pub const IGNORED_FIELDS: &[&str] = &["PASSKEY", "stationtype", "dateutc"];

/// Fields stored as integers; everything else that is not ignored is a float.
pub const INTEGER_FIELDS: &[&str] = &["uv", "batt_co2", "winddir", "humidity", "humidityin"];

pub const STATION_ID_FIELD: &str = "PASSKEY";
pub const STATION_TYPE_FIELD: &str = "stationtype";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Ignored,
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

/// Ignored wins over integer, anything else is a float.
pub fn classify(key: &str) -> FieldKind {
    if IGNORED_FIELDS.contains(&key) {
        FieldKind::Ignored
    } else if INTEGER_FIELDS.contains(&key) {
        FieldKind::Integer
    } else {
        FieldKind::Float
    }
}

pub fn is_ignored(key: &str) -> bool {
    classify(key) == FieldKind::Ignored
}

/// Classify and convert one value. `Ok(None)` for ignored keys.
pub fn parse_field(key: &str, raw: &str) -> Result<Option<FieldValue>, BridgeError> {
    let value = raw.trim();
    match classify(key) {
        FieldKind::Ignored => Ok(None),
        FieldKind::Integer => parse_int(value)
            .map(|v| Some(FieldValue::Integer(v)))
            .ok_or_else(|| parse_error(key, raw, "integer")),
        FieldKind::Float => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Some(FieldValue::Float(v)))
            .ok_or_else(|| parse_error(key, raw, "float")),
    }
}

fn parse_error(key: &str, raw: &str, expected: &'static str) -> BridgeError {
    BridgeError::FieldParse {
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    }
}

/// Signed integer with optional `0x`, `0o` or `0b` prefix and `_` separators.
/// A bare leading zero stays decimal.
fn parse_int(s: &str) -> Option<i64> {
    let (negative, unsigned) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match unsigned.get(..2) {
        Some("0x") | Some("0X") => (16, &unsigned[2..]),
        Some("0o") | Some("0O") => (8, &unsigned[2..]),
        Some("0b") | Some("0B") => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };

    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    if digits.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}
