use anyhow::{anyhow, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_status},
};
use crate::models::{TransferSession, TransferStatus};

const SESSION_COLUMNS: &str = "id, route_id, source_name, destination_name, start_timestamp, cleaning_interval_seconds, status";

fn row_to_session(row: &Row) -> Result<TransferSession> {
    let start_timestamp: String = row.get("start_timestamp")?;
    let status: String = row.get("status")?;

    Ok(TransferSession {
        id: row.get("id")?,
        route_id: row.get("route_id")?,
        source_name: row.get("source_name")?,
        destination_name: row.get("destination_name")?,
        start_timestamp: parse_datetime(&start_timestamp, "start_timestamp")?,
        cleaning_interval_seconds: row.get("cleaning_interval_seconds")?,
        status: parse_status(&status)?,
    })
}

impl Database {
    /// Inserts a session, replacing any existing row with the same id.
    pub async fn upsert_transfer_session(&self, session: &TransferSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO transfer_sessions (id, route_id, source_name, destination_name, start_timestamp, cleaning_interval_seconds, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     route_id = excluded.route_id,
                     source_name = excluded.source_name,
                     destination_name = excluded.destination_name,
                     start_timestamp = excluded.start_timestamp,
                     cleaning_interval_seconds = excluded.cleaning_interval_seconds,
                     status = excluded.status",
                params![
                    record.id,
                    record.route_id,
                    record.source_name,
                    record.destination_name,
                    format_datetime(&record.start_timestamp),
                    record.cleaning_interval_seconds,
                    record.status.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn mark_transfer_status(&self, session_id: &str, status: TransferStatus) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE transfer_sessions SET status = ?1 WHERE id = ?2",
                params![status.as_str(), session_id],
            )?;
            if updated == 0 {
                return Err(anyhow!("transfer session {session_id} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn list_transfer_sessions(&self) -> Result<Vec<TransferSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM transfer_sessions ORDER BY start_timestamp ASC, id ASC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    pub async fn get_active_transfer_sessions(&self) -> Result<Vec<TransferSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM transfer_sessions
                 WHERE status = 'Active'
                 ORDER BY start_timestamp ASC, id ASC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }
}
