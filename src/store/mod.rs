//! Session persistence boundary.
//!
//! The store prefers the SQLite file under the data directory. When that cannot be
//! opened it keeps working against an in-memory database with the same contract and
//! reports the degradation through [`SessionStore::is_durable`] and
//! [`SessionStore::status_message`]. Read and write failures after start-up are
//! logged and swallowed.

mod migration;

pub use migration::{migrate_legacy_sessions, MigrationOutcome};

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::{
    db::{Database, DbConfig},
    models::SessionRecord,
    settings::SettingsStore,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    durable: bool,
    status_message: Option<String>,
}

impl SessionStore {
    /// Opens the store and runs the one-time legacy import when the store is durable.
    ///
    /// Fails only when not even an in-memory database can be created.
    pub async fn initialize(db_path: PathBuf, settings: &SettingsStore) -> Result<Self> {
        let store = Self::open(db_path)?;
        if store.durable {
            let outcome = migrate_legacy_sessions(&store.db, settings).await;
            log_info!("Legacy session import: {outcome:?}");
        }
        Ok(store)
    }

    /// Durable file first, then a tuned in-memory database, then a default one.
    pub fn open(db_path: PathBuf) -> Result<Self> {
        let durable_err = match Database::open(db_path.clone()) {
            Ok(db) => {
                return Ok(Self {
                    db,
                    durable: true,
                    status_message: None,
                })
            }
            Err(err) => err,
        };

        log_warn!(
            "Durable session store at {} unavailable, falling back to memory: {durable_err:#}",
            db_path.display()
        );

        let db = Database::open_in_memory(DbConfig::volatile())
            .or_else(|err| {
                log_warn!("Tuned in-memory store failed, retrying with defaults: {err:#}");
                Database::open_in_memory(DbConfig::default())
            })
            .map_err(|err| anyhow!("no session store could be created: {err:#}"))?;

        Ok(Self::volatile_with(db, &format!("{durable_err:#}")))
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Result<Self> {
        let db = Database::open_in_memory(DbConfig::volatile())?;
        Ok(Self::volatile_with(db, "in-memory store requested"))
    }

    fn volatile_with(db: Database, reason: &str) -> Self {
        Self {
            db,
            durable: false,
            status_message: Some(format!(
                "Session history is kept in memory only and will be lost on quit ({reason})"
            )),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub async fn save(&self, record: &SessionRecord) {
        if let Err(err) = self.db.insert_session(record).await {
            log_error!("Failed to save session {}: {err:#}", record.id);
        }
    }

    /// Every session, most recent first.
    pub async fn fetch_all(&self) -> Vec<SessionRecord> {
        self.db.list_sessions().await.unwrap_or_else(|err| {
            log_error!("Failed to fetch sessions: {err:#}");
            Vec::new()
        })
    }

    /// Sessions with `start <= start_time < end`, most recent first.
    pub async fn fetch_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<SessionRecord> {
        self.db
            .list_sessions_in_range(start, end)
            .await
            .unwrap_or_else(|err| {
                log_error!("Failed to fetch sessions in range: {err:#}");
                Vec::new()
            })
    }

    pub async fn fetch_by_label(&self, label: &str) -> Vec<SessionRecord> {
        self.db
            .list_sessions_by_label(label)
            .await
            .unwrap_or_else(|err| {
                log_error!("Failed to fetch sessions labelled {label:?}: {err:#}");
                Vec::new()
            })
    }

    pub async fn delete(&self, id: &str) {
        match self.db.delete_session(id).await {
            Ok(true) => log_info!("Deleted session {id}"),
            Ok(false) => {}
            Err(err) => log_error!("Failed to delete session {id}: {err:#}"),
        }
    }

    pub async fn delete_all(&self) {
        match self.db.delete_all_sessions().await {
            Ok(removed) => log_info!("Cleared {removed} sessions"),
            Err(err) => log_error!("Failed to clear sessions: {err:#}"),
        }
    }

    pub async fn count(&self) -> u64 {
        self.db.count_sessions().await.unwrap_or_else(|err| {
            log_error!("Failed to count sessions: {err:#}");
            0
        })
    }
}
