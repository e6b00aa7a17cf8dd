use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::db::Database;
use crate::models::{CleaningRecord, Magnet, MagnetMapping, TransferSession, TransferStatus};

use super::{MonitorSource, SourceSnapshot};

/// Row counts written by one [`Database::mirror_snapshot`] pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorReport {
    pub sessions: usize,
    /// Local sessions marked stopped because upstream no longer lists them
    /// as active.
    pub deactivated: usize,
    pub magnets: usize,
    pub mappings: usize,
    pub new_cleanings: usize,
}

impl Database {
    /// Copies an upstream snapshot into the local tables so the database can
    /// serve as the monitor's source. Cleanings are append-only and copied
    /// once per record id.
    pub async fn mirror_snapshot(&self, snapshot: &SourceSnapshot) -> Result<MirrorReport> {
        let mut report = MirrorReport::default();

        for session in &snapshot.sessions {
            self.upsert_transfer_session(session)
                .await
                .with_context(|| format!("failed to mirror session {}", session.id))?;
            report.sessions += 1;
        }

        let upstream_active: HashSet<&str> = snapshot
            .active_sessions()
            .map(|session| session.id.as_str())
            .collect();
        for local in self.get_active_transfer_sessions().await? {
            if !upstream_active.contains(local.id.as_str()) {
                self.mark_transfer_status(&local.id, TransferStatus::Stopped)
                    .await?;
                report.deactivated += 1;
            }
        }

        for magnet in snapshot.magnets.values() {
            self.upsert_magnet(magnet).await?;
            report.magnets += 1;
        }
        for mapping in &snapshot.mappings {
            self.map_magnet_to_route(mapping).await?;
            report.mappings += 1;
        }

        let mut known: HashSet<String> = self
            .list_cleanings()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        for record in &snapshot.records {
            if known.insert(record.id.clone()) {
                self.insert_cleaning(record)
                    .await
                    .with_context(|| format!("failed to mirror cleaning {}", record.id))?;
                report.new_cleanings += 1;
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl MonitorSource for Database {
    async fn transfer_sessions(&self) -> Result<Vec<TransferSession>> {
        self.list_transfer_sessions().await
    }

    async fn magnet_mappings(&self) -> Result<Vec<MagnetMapping>> {
        self.list_magnet_mappings().await
    }

    async fn magnets(&self) -> Result<Vec<Magnet>> {
        self.list_magnets().await
    }

    // Only the newest record per magnet matters to the evaluator.
    async fn cleaning_records(&self) -> Result<Vec<CleaningRecord>> {
        self.latest_cleanings().await
    }

    async fn record_cleaning(&self, record: &CleaningRecord) -> Result<()> {
        self.insert_cleaning(record).await
    }
}
