//! Epoch-millisecond timestamps.
//!
//! Records, queue entries and the push race check all compare plain `i64`
//! milliseconds. Servers may send either epoch milliseconds or RFC 3339
//! strings; [`deserialize_millis`] folds both into milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses a timestamp given as text: integer milliseconds or RFC 3339.
pub fn parse_millis(text: &str) -> Result<i64, String> {
    let text = text.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return Ok(millis);
    }
    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.timestamp_millis())
        .map_err(|e| format!("invalid timestamp '{text}': {e}"))
}

/// Serde `deserialize_with` for record timestamps. `null` becomes 0.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Raw::Millis(millis)) => Ok(millis),
        Some(Raw::Fractional(millis)) => Ok(millis as i64),
        Some(Raw::Text(text)) => parse_millis(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Stamped {
        #[serde(default, deserialize_with = "deserialize_millis")]
        at: i64,
    }

    fn at(value: serde_json::Value) -> Result<i64, serde_json::Error> {
        serde_json::from_value::<Stamped>(value).map(|s| s.at)
    }

    #[test]
    fn now_is_monotonic_enough() {
        let first = now_millis();
        let second = now_millis();
        assert!(second >= first);
        assert!(first > 1_600_000_000_000);
    }

    #[test]
    fn accepts_millis_and_rfc3339() {
        assert_eq!(at(json!({ "at": 1_700_000_000_123_i64 })).unwrap(), 1_700_000_000_123);
        assert_eq!(at(json!({ "at": "2023-11-14T22:13:20.123Z" })).unwrap(), 1_700_000_000_123);
        assert_eq!(at(json!({ "at": "2023-11-14T23:13:20.123+01:00" })).unwrap(), 1_700_000_000_123);
        assert_eq!(at(json!({ "at": "1700000000123" })).unwrap(), 1_700_000_000_123);
    }

    #[test]
    fn missing_or_null_is_zero() {
        assert_eq!(at(json!({})).unwrap(), 0);
        assert_eq!(at(json!({ "at": null })).unwrap(), 0);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(at(json!({ "at": "yesterday" })).is_err());
        assert!(at(json!({ "at": true })).is_err());
    }
}
