use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        PoisonError, RwLock,
    },
};

/// Key under which older releases kept the whole session history as a JSON array.
pub const LEGACY_SESSIONS_KEY: &str = "savedSessions";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    #[serde(default = "default_true")]
    sound_enabled: bool,
    #[serde(default)]
    sessions_migrated: bool,
    #[serde(
        rename = "savedSessions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    legacy_sessions: Option<Value>,
    /// Keys written by other versions are kept as-is.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            sessions_migrated: false,
            legacy_sessions: None,
            extra: Map::new(),
        }
    }
}

/// Small JSON-backed preference file, the equivalent of a user-defaults domain.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
    /// Set when the file on disk could not be parsed; cleared once it is copied aside.
    backup_pending: AtomicBool,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut backup_pending = false;
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    log::warn!(
                        "Ignoring unreadable settings file {}: {err}",
                        path.display()
                    );
                    backup_pending = true;
                    UserSettings::default()
                }
            }
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            backup_pending: AtomicBool::new(backup_pending),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable settings file is copied before it is first overwritten.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    pub fn sound_enabled(&self) -> bool {
        self.read().sound_enabled
    }

    pub fn set_sound_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|settings| settings.sound_enabled = enabled)
    }

    pub fn sessions_migrated(&self) -> bool {
        self.read().sessions_migrated
    }

    pub fn mark_sessions_migrated(&self) -> Result<()> {
        self.update(|settings| settings.sessions_migrated = true)
    }

    /// Raw value stored under [`LEGACY_SESSIONS_KEY`], if any.
    pub fn legacy_sessions(&self) -> Option<Value> {
        self.read().legacy_sessions.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        apply(&mut next);
        self.back_up_unreadable()?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    /// Runs under the write lock, so at most one caller copies the file.
    fn back_up_unreadable(&self) -> Result<()> {
        if !self.backup_pending.load(Ordering::Acquire) {
            return Ok(());
        }
        let backup = self.backup_path();
        fs::copy(&self.path, &backup).with_context(|| {
            format!(
                "Refusing to overwrite {}: backup to {} failed",
                self.path.display(),
                backup.display()
            )
        })?;
        log::warn!("Kept unreadable settings as {}", backup.display());
        self.backup_pending.store(false, Ordering::Release);
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
