use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod repositories;

use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

/// Where the worker opens its connection.
#[derive(Debug, Clone)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    fn describe(&self) -> String {
        match self {
            DbLocation::File(path) => path.display().to_string(),
            DbLocation::Memory => ":memory:".to_string(),
        }
    }
}

/// Connection tuning applied before migrations run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbConfig {
    pub write_ahead_log: bool,
    pub tuned_pragmas: bool,
}

impl DbConfig {
    pub fn durable() -> Self {
        Self {
            write_ahead_log: true,
            tuned_pragmas: true,
        }
    }

    pub fn volatile() -> Self {
        Self {
            write_ahead_log: false,
            tuned_pragmas: true,
        }
    }
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to a SQLite connection owned by a dedicated worker thread.
///
/// Every statement runs on that thread in submission order, so the handle can be
/// cloned freely without any further locking.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    location: Arc<DbLocation>,
}

impl Database {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        Self::spawn(DbLocation::File(db_path), DbConfig::durable())
    }

    pub fn open_in_memory(config: DbConfig) -> Result<Self> {
        Self::spawn(DbLocation::Memory, config)
    }

    fn spawn(location: DbLocation, config: DbConfig) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let location_for_thread = location.clone();

        let worker = thread::Builder::new()
            .name("focusbar-db".into())
            .spawn(move || {
                let opened = match &location_for_thread {
                    DbLocation::File(path) => Connection::open(path),
                    DbLocation::Memory => Connection::open_in_memory(),
                };
                let mut conn = match opened {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                apply_pragmas(&conn, config);

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        let ready = ready_rx
            .recv()
            .context("database worker exited before signaling readiness");

        if let Err(err) = ready.and_then(|result| result) {
            drop(command_tx);
            let _ = worker.join();
            return Err(err);
        }

        info!("Database initialized at {}", location.describe());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            location: Arc::new(location),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match self.location.as_ref() {
            DbLocation::File(path) => Some(path.as_path()),
            DbLocation::Memory => None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.location.as_ref(), DbLocation::Memory)
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

fn apply_pragmas(conn: &Connection, config: DbConfig) {
    if config.write_ahead_log {
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }
    }
    if config.tuned_pragmas {
        if let Err(err) = conn.pragma_update(None, "synchronous", "NORMAL") {
            error!("Failed to set synchronous mode: {err}");
        }
        if let Err(err) = conn.pragma_update(None, "temp_store", "MEMORY") {
            error!("Failed to set temp_store: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_runs_migrations() {
        let db = Database::open_in_memory(DbConfig::volatile()).unwrap();
        assert!(db.is_in_memory());
        assert!(db.path().is_none());

        let version: i32 = db
            .execute(|conn| {
                Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn file_database_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.sqlite3");
        let db = Database::open(path.clone()).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn opening_below_a_regular_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("plain-file");
        std::fs::write(&blocker, b"").unwrap();
        assert!(Database::open(blocker.join("sessions.sqlite3")).is_err());
    }
}
