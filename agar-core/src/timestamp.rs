//! Timestamp normalization for conference documents.
//!
//! Stored documents carry their boundaries in whatever shape the writer
//! produced: a `{seconds, nanoseconds}` structure (or the `_seconds` variant
//! emitted by admin SDKs), epoch milliseconds as a number or numeric string,
//! an RFC 3339 string, or a `datetime-local` form value. Adapters run every
//! boundary through [`normalize_instant`] so nothing past the store boundary
//! branches on representation.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("unsupported timestamp shape: {0}")]
    UnsupportedShape(String),
    #[error("unparseable timestamp string '{0}'")]
    Unparseable(String),
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Converts a raw document value into an instant.
///
/// `null` and empty strings are "absent" (`Ok(None)`); anything that looks
/// like a timestamp but cannot be read is an error so the caller can skip the
/// record instead of guessing.
pub fn normalize_instant(value: &Value) -> Result<Option<DateTime<Utc>>, TimestampError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(ms) = number.as_i64() {
                from_millis(ms).map(Some)
            } else {
                match number.as_f64() {
                    Some(ms) if ms.is_finite() => from_millis(ms.trunc() as i64).map(Some),
                    _ => Err(TimestampError::OutOfRange(number.to_string())),
                }
            }
        }
        Value::String(raw) => parse_string(raw),
        Value::Object(fields) => from_seconds_object(fields).map(Some),
        other => Err(TimestampError::UnsupportedShape(shape_name(other).to_string())),
    }
}

fn parse_string(raw: &str) -> Result<Option<DateTime<Utc>>, TimestampError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    if let Ok(ms) = trimmed.parse::<i64>() {
        return from_millis(ms).map(Some);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| TimestampError::Unparseable(raw.to_string()))
}

fn from_seconds_object(fields: &Map<String, Value>) -> Result<DateTime<Utc>, TimestampError> {
    let seconds = fields
        .get("seconds")
        .or_else(|| fields.get("_seconds"))
        .and_then(integer_field)
        .ok_or_else(|| TimestampError::UnsupportedShape("object without seconds".to_string()))?;
    let nanos = fields
        .get("nanoseconds")
        .or_else(|| fields.get("_nanoseconds"))
        .or_else(|| fields.get("nanos"))
        .and_then(integer_field)
        .unwrap_or(0);

    let nanos = u32::try_from(nanos)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(|| TimestampError::OutOfRange(format!("nanoseconds {nanos}")))?;

    DateTime::from_timestamp(seconds, nanos)
        .ok_or_else(|| TimestampError::OutOfRange(format!("seconds {seconds}")))
}

// Integer fields arrive as JSON numbers or, from REST payloads, as strings.
fn integer_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| TimestampError::OutOfRange(format!("{ms} ms")))
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn accepts_every_known_shape() {
        let at = expected();
        let shapes = [
            json!({ "seconds": at.timestamp(), "nanoseconds": 0 }),
            json!({ "_seconds": at.timestamp(), "_nanoseconds": 0 }),
            json!(at.timestamp_millis()),
            json!(at.timestamp_millis().to_string()),
            json!("2024-05-01T10:30:00Z"),
            json!("2024-05-01T12:30:00+02:00"),
            json!("2024-05-01T10:30"),
            json!("2024-05-01 10:30:00"),
        ];

        for shape in shapes {
            assert_eq!(normalize_instant(&shape), Ok(Some(at)), "shape {shape}");
        }
    }

    #[test]
    fn keeps_sub_second_precision() {
        let value = json!({ "seconds": 1_714_559_400, "nanoseconds": 250_000_000 });
        let instant = normalize_instant(&value).unwrap().unwrap();
        assert_eq!(instant.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn null_and_blank_are_absent() {
        assert_eq!(normalize_instant(&Value::Null), Ok(None));
        assert_eq!(normalize_instant(&json!("  ")), Ok(None));
    }

    #[test]
    fn rejects_unrecognized_values() {
        assert!(matches!(
            normalize_instant(&json!(true)),
            Err(TimestampError::UnsupportedShape(_))
        ));
        assert!(matches!(
            normalize_instant(&json!("next tuesday")),
            Err(TimestampError::Unparseable(_))
        ));
        assert!(matches!(
            normalize_instant(&json!({ "when": 12 })),
            Err(TimestampError::UnsupportedShape(_))
        ));
        assert!(matches!(
            normalize_instant(&json!({ "seconds": 1, "nanoseconds": 2_000_000_000u64 })),
            Err(TimestampError::OutOfRange(_))
        ));
    }
}
