//! Completed focus sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label given to sessions started without one.
pub const UNLABELED: &str = "Unlabeled";

/// One completed focus interval. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Stored as given; not recomputed from the interval.
    pub duration_seconds: u64,
    pub label: String,
}

impl SessionRecord {
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_seconds: u64,
        label: impl Into<String>,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4().to_string(),
            start_time,
            end_time,
            duration_seconds,
            label,
        )
    }

    pub fn from_interval(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        label: impl Into<String>,
    ) -> Self {
        let seconds = (end_time - start_time).num_seconds().max(0) as u64;
        Self::new(start_time, end_time, seconds, label)
    }

    /// Builds a record with a known id. An end before the start is clamped to the start.
    pub fn with_id(
        id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_seconds: u64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            start_time,
            end_time: end_time.max(start_time),
            duration_seconds,
            label: normalize_label(label.into()),
        }
    }

    pub fn interval_seconds(&self) -> u64 {
        (self.end_time - self.start_time).num_seconds().max(0) as u64
    }
}

pub fn normalize_label(label: String) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        UNLABELED.to_string()
    } else if trimmed.len() == label.len() {
        label
    } else {
        trimmed.to_string()
    }
}
