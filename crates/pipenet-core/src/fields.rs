//! Coercion helpers for loosely-typed scalar fields.
//!
//! Client payloads carry numbers as JSON numbers or strings (with either a
//! decimal point or a decimal comma), booleans as booleans, 0/1 or tokens,
//! and timestamps as ISO-8601 UTC strings. Every helper takes a
//! [`FieldContext`] so failures name the offending entity.
//!
//! Contract: an absent value, JSON `null` or a blank string is "absent".
//! A present but unparsable value is an error, never silently dropped.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::error::{EntityKind, ValidationError};
use crate::geometry::Point;

static ISO_UTC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,6})?Z$").expect("static regex")
});

const TRUE_TOKENS: &[&str] = &["true", "1", "yes", "y", "on", "oui", "vrai"];
const FALSE_TOKENS: &[&str] = &["false", "0", "no", "n", "off", "non", "faux"];

/// Unix seconds of `2000-01-01T00:00:00Z`, the base for synthesized timestamps.
const SYNTHETIC_EPOCH_S: i64 = 946_684_800;

/// Identifies the entity whose fields are being coerced.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub kind: EntityKind,
    pub id: &'a str,
}

impl<'a> FieldContext<'a> {
    pub fn node(id: &'a str) -> Self {
        Self {
            kind: EntityKind::Node,
            id,
        }
    }

    pub fn edge(id: &'a str) -> Self {
        Self {
            kind: EntityKind::Edge,
            id,
        }
    }

    pub fn graph() -> Self {
        Self {
            kind: EntityKind::Graph,
            id: "graph",
        }
    }

    pub fn missing(&self, field: &str) -> ValidationError {
        ValidationError::MissingField {
            kind: self.kind,
            id: self.id.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid(&self, field: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError::InvalidField {
            kind: self.kind,
            id: self.id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parses a finite number from a JSON number or numeric string.
///
/// Accepts a decimal comma (`"11,5"`). Returns `None` for anything else.
pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let text = s.trim().replace(',', ".");
            text.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Coerces an optional float. With `reject_negative`, values below zero fail.
pub fn optional_float(
    ctx: FieldContext<'_>,
    field: &str,
    value: Option<&Value>,
    reject_negative: bool,
) -> Result<Option<f64>, ValidationError> {
    if is_absent(value) {
        return Ok(None);
    }
    let Some(raw) = value else { return Ok(None) };
    let number = parse_number(raw).ok_or_else(|| ctx.invalid(field, format!("not a finite number: {raw}")))?;
    if reject_negative && number < 0.0 {
        return Err(ctx.invalid(field, format!("negative value {number}")));
    }
    Ok(Some(number))
}

/// Coerces a required finite float; absence fails with `missing_field`.
pub fn required_float(
    ctx: FieldContext<'_>,
    field: &str,
    value: Option<&Value>,
    reject_negative: bool,
) -> Result<f64, ValidationError> {
    optional_float(ctx, field, value, reject_negative)?.ok_or_else(|| ctx.missing(field))
}

/// Coerces an optional integer. Floats with a fractional part fail.
pub fn optional_int(
    ctx: FieldContext<'_>,
    field: &str,
    value: Option<&Value>,
) -> Result<Option<i64>, ValidationError> {
    if is_absent(value) {
        return Ok(None);
    }
    let Some(raw) = value else { return Ok(None) };
    if let Some(i) = raw.as_i64() {
        return Ok(Some(i));
    }
    match parse_number(raw) {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
        _ => Err(ctx.invalid(field, format!("not an integer: {raw}"))),
    }
}

/// Coerces a boolean, accepting common true/false spellings.
///
/// Absent values yield `default`.
pub fn boolean(
    ctx: FieldContext<'_>,
    field: &str,
    value: Option<&Value>,
    default: bool,
) -> Result<bool, ValidationError> {
    if is_absent(value) {
        return Ok(default);
    }
    match value {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 1.0 => Ok(true),
            Some(v) if v == 0.0 => Ok(false),
            _ => Err(ctx.invalid(field, format!("not a boolean: {n}"))),
        },
        Some(Value::String(s)) => {
            let token = s.trim().to_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Ok(true)
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Ok(false)
            } else {
                Err(ctx.invalid(field, format!("not a boolean: {s}")))
            }
        }
        Some(other) => Err(ctx.invalid(field, format!("not a boolean: {other}"))),
        None => Ok(default),
    }
}

/// Returns a trimmed, non-empty text for strings and numbers.
pub fn optional_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Like [`optional_text`] but uppercased; used for material and SDR codes.
pub fn upper_text(value: Option<&Value>) -> Option<String> {
    optional_text(value).map(|s| s.to_uppercase())
}

/// Checks `YYYY-MM-DDTHH:MM:SS[.ffffff]Z`.
pub fn is_iso_utc(text: &str) -> bool {
    ISO_UTC_RE.is_match(text)
}

/// Coerces an optional ISO-8601 UTC timestamp string.
pub fn iso_timestamp(
    ctx: FieldContext<'_>,
    field: &str,
    value: Option<&Value>,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = optional_text(value) else {
        return Ok(None);
    };
    if is_iso_utc(&text) {
        Ok(Some(text))
    } else {
        Err(ValidationError::InvalidTimestamp {
            kind: ctx.kind,
            id: ctx.id.to_string(),
            field: field.to_string(),
            value: text,
        })
    }
}

/// Milliseconds since the Unix epoch for a validated timestamp.
pub fn timestamp_millis(text: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

/// Deterministic creation timestamp for the edge at input position `index`.
///
/// Later positions get later timestamps, so input order acts as creation
/// order in the tie-break cascade.
pub fn synthesize_created_at(index: usize) -> String {
    let seconds = SYNTHETIC_EPOCH_S.saturating_add(index as i64);
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Parses one geometry point: `[lon, lat]` or `{lon|lng|x, lat|y}`.
///
/// Malformed or non-finite points yield `None` and are dropped by callers.
pub fn parse_point(value: &Value) -> Option<Point> {
    let (lon, lat) = match value {
        Value::Array(items) if items.len() >= 2 => (parse_number(&items[0])?, parse_number(&items[1])?),
        Value::Object(map) => {
            let lon = ["lon", "lng", "longitude", "x"]
                .iter()
                .find_map(|k| map.get(*k).and_then(parse_number))?;
            let lat = ["lat", "latitude", "y"]
                .iter()
                .find_map(|k| map.get(*k).and_then(parse_number))?;
            (lon, lat)
        }
        _ => return None,
    };
    Some([lon, lat])
}

/// Parses a geometry array, dropping malformed points.
pub fn parse_points(value: Option<&Value>) -> Vec<Point> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(parse_point).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> FieldContext<'static> {
        FieldContext::edge("E-1")
    }

    #[test]
    fn float_accepts_numbers_and_strings() {
        assert_eq!(optional_float(ctx(), "d", Some(&json!(160)), true).unwrap(), Some(160.0));
        assert_eq!(optional_float(ctx(), "d", Some(&json!("90.5")), true).unwrap(), Some(90.5));
        assert_eq!(optional_float(ctx(), "d", Some(&json!(" 11,5 ")), true).unwrap(), Some(11.5));
    }

    #[test]
    fn float_absent_values() {
        assert_eq!(optional_float(ctx(), "d", None, true).unwrap(), None);
        assert_eq!(optional_float(ctx(), "d", Some(&Value::Null), true).unwrap(), None);
        assert_eq!(optional_float(ctx(), "d", Some(&json!("  ")), true).unwrap(), None);
    }

    #[test]
    fn float_rejects_garbage_and_negatives() {
        let err = optional_float(ctx(), "diameter_mm", Some(&json!("abc")), false).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidField);
        let err = optional_float(ctx(), "diameter_mm", Some(&json!(-1)), true).unwrap_err();
        assert!(err.to_string().contains("diameter_mm"));
        assert_eq!(optional_float(ctx(), "x", Some(&json!(-1)), false).unwrap(), Some(-1.0));
    }

    #[test]
    fn required_float_reports_missing() {
        let err = required_float(FieldContext::node("OUVRAGE-1"), "gps_lat", None, false).unwrap_err();
        assert_eq!(err.to_string(), "node missing gps_lat: OUVRAGE-1");
        let err = required_float(ctx(), "d", Some(&json!("NaN")), false).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidField);
    }

    #[test]
    fn int_coercion() {
        assert_eq!(optional_int(ctx(), "i", Some(&json!(3))).unwrap(), Some(3));
        assert_eq!(optional_int(ctx(), "i", Some(&json!("12"))).unwrap(), Some(12));
        assert!(optional_int(ctx(), "i", Some(&json!(1.5))).is_err());
    }

    #[test]
    fn boolean_tokens() {
        assert!(boolean(ctx(), "active", Some(&json!("Oui")), false).unwrap());
        assert!(boolean(ctx(), "active", Some(&json!(1)), false).unwrap());
        assert!(!boolean(ctx(), "active", Some(&json!("off")), true).unwrap());
        assert!(!boolean(ctx(), "active", Some(&json!(false)), true).unwrap());
        assert!(boolean(ctx(), "active", None, true).unwrap());
        assert!(boolean(ctx(), "active", Some(&json!("maybe")), true).is_err());
    }

    #[test]
    fn text_helpers() {
        assert_eq!(optional_text(Some(&json!("  pe100 "))), Some("pe100".into()));
        assert_eq!(upper_text(Some(&json!("pe100"))), Some("PE100".into()));
        assert_eq!(optional_text(Some(&json!(11))), Some("11".into()));
        assert_eq!(optional_text(Some(&json!(""))), None);
        assert_eq!(optional_text(Some(&json!([1]))), None);
    }

    #[test]
    fn iso_timestamps() {
        assert!(is_iso_utc("2024-03-01T10:00:00Z"));
        assert!(is_iso_utc("2024-03-01T10:00:00.123456Z"));
        assert!(!is_iso_utc("2024-03-01T10:00:00+01:00"));
        assert!(!is_iso_utc("2024-03-01 10:00:00Z"));
        assert!(!is_iso_utc("2024-03-01T10:00:00.1234567Z"));

        let err = iso_timestamp(ctx(), "created_at", Some(&json!("yesterday"))).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidTimestamp);
        assert_eq!(iso_timestamp(ctx(), "created_at", None).unwrap(), None);
    }

    #[test]
    fn millis_orders_timestamps() {
        let a = timestamp_millis("2024-01-01T00:00:00Z").unwrap();
        let b = timestamp_millis("2024-01-01T00:00:00.5Z").unwrap();
        assert_eq!(b - a, 500);
    }

    #[test]
    fn synthesized_timestamps_follow_input_order() {
        assert_eq!(synthesize_created_at(0), "2000-01-01T00:00:00Z");
        assert_eq!(synthesize_created_at(61), "2000-01-01T00:01:01Z");
        assert!(is_iso_utc(&synthesize_created_at(12345)));
        let a = timestamp_millis(&synthesize_created_at(3)).unwrap();
        let b = timestamp_millis(&synthesize_created_at(4)).unwrap();
        assert!(a < b);
    }

    #[test]
    fn points_parse_arrays_and_objects() {
        assert_eq!(parse_point(&json!([2.5, "48,1"])), Some([2.5, 48.1]));
        assert_eq!(parse_point(&json!({"lng": 1, "lat": 2})), Some([1.0, 2.0]));
        assert_eq!(parse_point(&json!([1])), None);
        assert_eq!(parse_point(&json!(["x", 2])), None);
        let pts = parse_points(Some(&json!([[0, 0], "junk", [0, 1]])));
        assert_eq!(pts, vec![[0.0, 0.0], [0.0, 1.0]]);
    }
}
