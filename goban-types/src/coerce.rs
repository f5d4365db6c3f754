//! Permissive numeric coercion for loosely typed JSON payloads.
//!
//! The server is inconsistent about number encodings: the same field may
//! arrive as `7`, `"7"` or `7.0` depending on which code path produced the
//! payload. Every decoder in this crate goes through these helpers so the
//! leniency is defined in exactly one place.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce to a signed integer. Decimals are truncated toward zero.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(float_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        _ => None,
    }
}

/// Coerce to an unsigned integer. Negative values are rejected.
pub fn as_u64(value: &Value) -> Option<u64> {
    as_i64(value).and_then(|v| u64::try_from(v).ok())
}

/// Coerce to a float.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Coerce to a boolean: JSON booleans, non-zero numbers, and the strings
/// `"true"`/`"false"`/`"1"`/`"0"`.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(_) => as_f64(value).map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Seconds (any numeric encoding) to whole milliseconds, floored at zero.
pub fn secs_to_ms(value: &Value) -> Option<u64> {
    as_f64(value).map(|secs| (secs * 1000.0).round().max(0.0) as u64)
}

/// Look up `key` on an object and coerce it to `u64`.
pub fn field_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(as_u64)
}

/// Look up `key` on an object and coerce it to `i64`.
pub fn field_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(as_i64)
}

/// Look up `key` on an object and coerce it to a boolean.
pub fn field_bool(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(as_bool)
}

/// Look up `key` on an object as a non-empty string.
pub fn field_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Serde adapter: deserialize a `u64` from any numeric encoding.
pub fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_u64(&value).ok_or_else(|| serde::de::Error::custom(format!("not a number: {}", value)))
}

fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_in_every_encoding() {
        assert_eq!(as_i64(&json!(7)), Some(7));
        assert_eq!(as_i64(&json!("7")), Some(7));
        assert_eq!(as_i64(&json!(" 7 ")), Some(7));
        assert_eq!(as_i64(&json!(7.0)), Some(7));
        assert_eq!(as_i64(&json!("7.9")), Some(7));
        assert_eq!(as_i64(&json!(-3)), Some(-3));
    }

    #[test]
    fn non_numbers_are_rejected() {
        assert_eq!(as_i64(&json!(null)), None);
        assert_eq!(as_i64(&json!("seven")), None);
        assert_eq!(as_i64(&json!([1])), None);
        assert_eq!(as_i64(&json!({"v": 1})), None);
    }

    #[test]
    fn unsigned_rejects_negative() {
        assert_eq!(as_u64(&json!(-1)), None);
        assert_eq!(as_u64(&json!("12")), Some(12));
    }

    #[test]
    fn booleans_are_lenient() {
        assert_eq!(as_bool(&json!(true)), Some(true));
        assert_eq!(as_bool(&json!(1)), Some(true));
        assert_eq!(as_bool(&json!(0)), Some(false));
        assert_eq!(as_bool(&json!("true")), Some(true));
        assert_eq!(as_bool(&json!("maybe")), None);
    }

    #[test]
    fn seconds_to_millis() {
        assert_eq!(secs_to_ms(&json!(30)), Some(30_000));
        assert_eq!(secs_to_ms(&json!("1.5")), Some(1_500));
        assert_eq!(secs_to_ms(&json!(-2)), Some(0));
    }

    #[test]
    fn field_helpers() {
        let v = json!({"n": "42", "flag": 1, "s": "", "t": "x"});
        assert_eq!(field_u64(&v, "n"), Some(42));
        assert_eq!(field_bool(&v, "flag"), Some(true));
        assert_eq!(field_str(&v, "s"), None);
        assert_eq!(field_str(&v, "t"), Some("x"));
        assert_eq!(field_u64(&v, "missing"), None);
    }
}
