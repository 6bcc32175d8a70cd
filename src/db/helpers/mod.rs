use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width UTC timestamp so that text comparison matches time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}
