//! Deserialization utilities for upstream payloads that encode numbers and
//! timestamps as strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de};

/// Deserialize a `String` field and parse it into `T` (eg. `"65032.40"` into
/// an `f64`).
pub fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<T>().map_err(de::Error::custom)
}

/// Deserialize a `u64` millisecond epoch into a `DateTime<Utc>`.
pub fn de_u64_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let epoch_ms = u64::deserialize(deserializer)?;
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .ok_or_else(|| de::Error::custom(format!("epoch ms out of range: {epoch_ms}")))
}

/// Deserialize a string-encoded millisecond epoch (`"1736899200000"`), as sent
/// by OKX, into a `DateTime<Utc>`.
pub fn de_str_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let epoch_ms = raw.parse::<i64>().map_err(de::Error::custom)?;
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .ok_or_else(|| de::Error::custom(format!("epoch ms out of range: {epoch_ms}")))
}
