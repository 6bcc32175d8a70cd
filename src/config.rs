use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::Weekday;

use crate::playback::MirrorConfig;

const APP_DIR_NAME: &str = "focusbar";
const DB_FILE_NAME: &str = "focusbar.sqlite3";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Process-level configuration, read from `FOCUSBAR_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub week_start: Weekday,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("FOCUSBAR_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or_else(|| anyhow!("no data directory for this platform; set FOCUSBAR_DATA_DIR"))?
                .join(APP_DIR_NAME),
        };

        let poll_secs: u64 = parse_var(&lookup, "FOCUSBAR_POLL_SECS", 2)?;
        let settle_ms: u64 = parse_var(&lookup, "FOCUSBAR_SETTLE_MS", 500)?;

        let week_start = match lookup("FOCUSBAR_WEEK_START") {
            Some(raw) => Weekday::from_str(raw.trim())
                .map_err(|_| anyhow!("FOCUSBAR_WEEK_START: unknown weekday {raw:?}"))?,
            None => Weekday::Mon,
        };

        let debug = lookup("FOCUSBAR_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            data_dir,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            settle_delay: Duration::from_millis(settle_ms),
            week_start,
            debug,
        })
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_millis(500),
            week_start: Weekday::Mon,
            debug: false,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn mirror(&self) -> MirrorConfig {
        MirrorConfig {
            poll_interval: self.poll_interval,
            settle_delay: self.settle_delay,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: invalid value {raw:?}")),
        None => Ok(default),
    }
}
