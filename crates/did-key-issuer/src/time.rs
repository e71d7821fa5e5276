//! Time utilities for the issuer.
//!
//! Timestamps are UTC and serialize as ISO-8601 with millisecond precision,
//! e.g. `2024-05-01T12:00:00.000Z`.

use chrono::{DateTime, SecondsFormat, Utc};

/// Return the current time, truncated to whole milliseconds so that a value
/// survives a round trip through its serialized form unchanged.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Format a timestamp as ISO-8601 with millisecond precision and a `Z` suffix.
pub fn to_iso8601(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for `DateTime<Utc>` fields stored as millisecond ISO-8601.
pub mod iso8601_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_iso8601(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
