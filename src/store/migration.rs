use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    db::Database,
    models::{SessionRecord, UNLABELED},
    settings::SettingsStore,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    AlreadyMigrated,
    NothingToMigrate,
    Migrated { total: usize, inserted: usize },
    /// Completion was not recorded; the import runs again on the next launch.
    Failed,
}

/// Shape of one entry in the legacy `savedSessions` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySession {
    id: String,
    #[serde(deserialize_with = "legacy_date")]
    start_time: DateTime<Utc>,
    #[serde(deserialize_with = "legacy_date")]
    end_time: DateTime<Utc>,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    label: Option<String>,
}

/// Unix time of 2001-01-01T00:00:00Z, the epoch of Foundation reference dates.
const REFERENCE_EPOCH_SECONDS: f64 = 978_307_200.0;

/// Legacy dates were written either as RFC 3339 text or as seconds since the
/// reference epoch, depending on the encoder's date strategy.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyDate {
    Text(DateTime<Utc>),
    ReferenceSeconds(f64),
}

fn from_reference_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let unix = REFERENCE_EPOCH_SECONDS + seconds;
    let whole = unix.floor();
    let nanos = (((unix - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

fn legacy_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match LegacyDate::deserialize(deserializer)? {
        LegacyDate::Text(date) => Ok(date),
        LegacyDate::ReferenceSeconds(seconds) => from_reference_seconds(seconds)
            .ok_or_else(|| serde::de::Error::custom(format!("date out of range: {seconds}"))),
    }
}

impl From<LegacySession> for SessionRecord {
    fn from(legacy: LegacySession) -> Self {
        let duration_seconds = if legacy.duration > 0.0 {
            legacy.duration.floor() as u64
        } else {
            0
        };
        SessionRecord::with_id(
            legacy.id,
            legacy.start_time,
            legacy.end_time,
            duration_seconds,
            legacy.label.unwrap_or_else(|| UNLABELED.to_string()),
        )
    }
}

fn decode(raw: Value) -> Result<Vec<SessionRecord>> {
    let legacy: Vec<LegacySession> =
        serde_json::from_value(raw).context("legacy session list is malformed")?;
    Ok(legacy.into_iter().map(SessionRecord::from).collect())
}

/// Copies the legacy JSON session list into the database once.
///
/// Rows are inserted with their legacy ids and existing ids are skipped, so a run
/// interrupted before the completion flag is written never duplicates history.
pub async fn migrate_legacy_sessions(db: &Database, settings: &SettingsStore) -> MigrationOutcome {
    if settings.sessions_migrated() {
        return MigrationOutcome::AlreadyMigrated;
    }

    let Some(raw) = settings.legacy_sessions() else {
        return MigrationOutcome::NothingToMigrate;
    };

    match import(db, settings, raw).await {
        Ok(outcome) => outcome,
        Err(err) => {
            log_error!("Legacy session import failed: {err:#}");
            MigrationOutcome::Failed
        }
    }
}

async fn import(db: &Database, settings: &SettingsStore, raw: Value) -> Result<MigrationOutcome> {
    let records = decode(raw)?;
    let total = records.len();
    let inserted = db
        .insert_sessions_if_absent(records)
        .await
        .context("failed to insert legacy sessions")?;

    settings
        .mark_sessions_migrated()
        .context("failed to record legacy import completion")?;

    log_info!("Imported {inserted} of {total} legacy sessions");
    Ok(MigrationOutcome::Migrated { total, inserted })
}
