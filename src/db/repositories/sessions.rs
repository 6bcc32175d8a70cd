use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::{
    db::{
        helpers::{format_timestamp, parse_datetime, to_i64, to_u64},
        Database,
    },
    models::SessionRecord,
};

const SELECT_COLUMNS: &str = "SELECT id, start_time, end_time, duration_seconds, label FROM sessions";
const MOST_RECENT_FIRST: &str = "ORDER BY start_time DESC, end_time DESC, id DESC";

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let duration_seconds: i64 = row.get("duration_seconds")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_datetime(&end_time, "end_time")?,
        duration_seconds: to_u64(duration_seconds, "duration_seconds")?,
        label: row.get("label")?,
    })
}

fn insert(conn: &rusqlite::Connection, record: &SessionRecord, ignore_existing: bool) -> Result<usize> {
    let verb = if ignore_existing {
        "INSERT OR IGNORE"
    } else {
        "INSERT"
    };
    let inserted = conn.execute(
        &format!(
            "{verb} INTO sessions (id, start_time, end_time, duration_seconds, label, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            record.id,
            format_timestamp(&record.start_time),
            format_timestamp(&record.end_time),
            to_i64(record.duration_seconds)?,
            record.label,
            format_timestamp(&Utc::now()),
        ],
    )?;
    Ok(inserted)
}

fn query_sessions(
    conn: &rusqlite::Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<SessionRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {filter} {MOST_RECENT_FIRST}"))?;
    let mut rows = stmt.query(params)?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    Ok(sessions)
}

impl Database {
    pub async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            insert(conn, &record, false)?;
            Ok(())
        })
        .await
    }

    /// Inserts every record whose id is not stored yet, in one transaction.
    /// Returns how many rows were actually added.
    pub async fn insert_sessions_if_absent(&self, sessions: Vec<SessionRecord>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            for record in &sessions {
                inserted += insert(&tx, record, true)?;
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.execute(|conn| query_sessions(conn, "", [])).await
    }

    pub async fn list_sessions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        if end <= start {
            return Ok(Vec::new());
        }
        self.execute(move |conn| {
            query_sessions(
                conn,
                "WHERE start_time >= ?1 AND start_time < ?2",
                params![format_timestamp(&start), format_timestamp(&end)],
            )
        })
        .await
    }

    pub async fn list_sessions_by_label(&self, label: &str) -> Result<Vec<SessionRecord>> {
        let label = label.to_string();
        self.execute(move |conn| query_sessions(conn, "WHERE label = ?1", params![label]))
            .await
    }

    /// Removes one session. Returns whether a row was deleted.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn delete_all_sessions(&self) -> Result<usize> {
        self.execute(|conn| Ok(conn.execute("DELETE FROM sessions", [])?))
            .await
    }

    pub async fn count_sessions(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }
}
