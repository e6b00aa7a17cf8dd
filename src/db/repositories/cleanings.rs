use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
};
use crate::models::CleaningRecord;

fn row_to_cleaning(row: &Row) -> Result<CleaningRecord> {
    let cleaning_timestamp: String = row.get("cleaning_timestamp")?;

    Ok(CleaningRecord {
        id: row.get("id")?,
        magnet_id: row.get("magnet_id")?,
        cleaning_timestamp: parse_datetime(&cleaning_timestamp, "cleaning_timestamp")?,
        transfer_session_id: row.get("transfer_session_id")?,
    })
}

impl Database {
    pub async fn insert_cleaning(&self, record: &CleaningRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO magnet_cleanings (id, magnet_id, cleaning_timestamp, transfer_session_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.magnet_id,
                    format_datetime(&record.cleaning_timestamp),
                    record.transfer_session_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_cleanings(&self) -> Result<Vec<CleaningRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, magnet_id, cleaning_timestamp, transfer_session_id
                 FROM magnet_cleanings
                 ORDER BY cleaning_timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_cleaning(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Latest cleaning per magnet, newest first.
    pub async fn latest_cleanings(&self) -> Result<Vec<CleaningRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.magnet_id, c.cleaning_timestamp, c.transfer_session_id
                 FROM magnet_cleanings c
                 WHERE NOT EXISTS (
                     SELECT 1 FROM magnet_cleanings newer
                     WHERE newer.magnet_id = c.magnet_id
                       AND (newer.cleaning_timestamp > c.cleaning_timestamp
                            OR (newer.cleaning_timestamp = c.cleaning_timestamp AND newer.id > c.id))
                 )
                 ORDER BY c.cleaning_timestamp DESC, c.magnet_id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_cleaning(row)?);
            }
            Ok(records)
        })
        .await
    }
}
