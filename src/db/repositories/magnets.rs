use anyhow::Result;
use rusqlite::params;

use crate::db::connection::Database;
use crate::models::{Magnet, MagnetMapping};

impl Database {
    pub async fn upsert_magnet(&self, magnet: &Magnet) -> Result<()> {
        let record = magnet.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO magnets (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![record.id, record.name],
            )?;
            Ok(())
        })
        .await
    }

    /// Places a magnet on a route. Re-adding an existing pair is a no-op.
    pub async fn map_magnet_to_route(&self, mapping: &MagnetMapping) -> Result<()> {
        let record = mapping.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO route_magnets (route_id, magnet_id) VALUES (?1, ?2)",
                params![record.route_id, record.magnet_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_magnets(&self) -> Result<Vec<Magnet>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM magnets ORDER BY name ASC")?;
            let magnets = stmt
                .query_map([], |row| {
                    Ok(Magnet {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(magnets)
        })
        .await
    }

    pub async fn list_magnet_mappings(&self) -> Result<Vec<MagnetMapping>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT route_id, magnet_id FROM route_magnets ORDER BY route_id ASC, rowid ASC",
            )?;
            let mappings = stmt
                .query_map([], |row| {
                    Ok(MagnetMapping {
                        route_id: row.get(0)?,
                        magnet_id: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(mappings)
        })
        .await
    }
}
