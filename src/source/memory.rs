use std::sync::{
    atomic::{AtomicBool, Ordering},
    RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{CleaningRecord, Magnet, MagnetMapping, TransferSession, TransferStatus};

use super::MonitorSource;

#[derive(Debug, Default)]
struct Tables {
    sessions: Vec<TransferSession>,
    mappings: Vec<MagnetMapping>,
    magnets: Vec<Magnet>,
    records: Vec<CleaningRecord>,
}

/// Source backed by plain vectors. Hosts that already hold the data (and
/// tests) push it in directly.
#[derive(Debug, Default)]
pub struct InMemorySource {
    tables: RwLock<Tables>,
    failing: AtomicBool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("source unavailable");
        }
        Ok(())
    }

    /// While set, every fetch fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Inserts a session or replaces the one with the same id.
    pub fn upsert_session(&self, session: TransferSession) {
        let mut tables = self.write();
        match tables.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => tables.sessions.push(session),
        }
    }

    pub fn set_session_status(&self, session_id: &str, status: TransferStatus) -> bool {
        let mut tables = self.write();
        match tables.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.status = status;
                true
            }
            None => false,
        }
    }

    /// Registers a magnet and places it on `route_id`.
    pub fn add_route_magnet(&self, route_id: &str, magnet: Magnet) {
        let mut tables = self.write();
        tables.mappings.push(MagnetMapping {
            magnet_id: magnet.id.clone(),
            route_id: route_id.to_string(),
        });
        if !tables.magnets.iter().any(|m| m.id == magnet.id) {
            tables.magnets.push(magnet);
        }
    }

    pub fn push_record(&self, record: CleaningRecord) {
        self.write().records.push(record);
    }
}

#[async_trait]
impl MonitorSource for InMemorySource {
    async fn transfer_sessions(&self) -> Result<Vec<TransferSession>> {
        self.check_available()?;
        Ok(self.read().sessions.clone())
    }

    async fn magnet_mappings(&self) -> Result<Vec<MagnetMapping>> {
        self.check_available()?;
        Ok(self.read().mappings.clone())
    }

    async fn magnets(&self) -> Result<Vec<Magnet>> {
        self.check_available()?;
        Ok(self.read().magnets.clone())
    }

    async fn cleaning_records(&self) -> Result<Vec<CleaningRecord>> {
        self.check_available()?;
        Ok(self.read().records.clone())
    }

    async fn record_cleaning(&self, record: &CleaningRecord) -> Result<()> {
        self.check_available()?;
        self.push_record(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceSnapshot;
    use chrono::Utc;

    fn session(id: &str) -> TransferSession {
        TransferSession {
            id: id.into(),
            route_id: "route-a".into(),
            source_name: "Godown 1".into(),
            destination_name: "Bin 3".into(),
            start_timestamp: Utc::now(),
            cleaning_interval_seconds: 600,
            status: TransferStatus::Active,
        }
    }

    #[tokio::test]
    async fn snapshot_indexes_magnets_and_filters_active() {
        let source = InMemorySource::new();
        source.upsert_session(session("t-1"));
        source.upsert_session(session("t-2"));
        source.set_session_status("t-2", TransferStatus::Stopped);
        source.add_route_magnet(
            "route-a",
            Magnet {
                id: "m1".into(),
                name: "Drum".into(),
            },
        );
        source.add_route_magnet(
            "route-b",
            Magnet {
                id: "m1".into(),
                name: "Drum".into(),
            },
        );

        let snapshot = SourceSnapshot::load(&source).await.unwrap();
        let active: Vec<_> = snapshot.active_sessions().map(|s| s.id.as_str()).collect();
        assert_eq!(active, vec!["t-1"]);
        assert_eq!(snapshot.mappings.len(), 2);
        assert_eq!(snapshot.magnets.len(), 1);
        assert_eq!(snapshot.magnets["m1"].name, "Drum");
    }

    #[tokio::test]
    async fn failing_source_rejects_every_fetch() {
        let source = InMemorySource::new();
        source.set_failing(true);
        assert!(SourceSnapshot::load(&source).await.is_err());
        assert!(source
            .record_cleaning(&CleaningRecord::new("m1", Utc::now()))
            .await
            .is_err());

        source.set_failing(false);
        assert!(SourceSnapshot::load(&source).await.is_ok());
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let source = InMemorySource::new();
        source.upsert_session(session("t-1"));
        let mut changed = session("t-1");
        changed.destination_name = "Bin 9".into();
        source.upsert_session(changed);

        let sessions = source.transfer_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].destination_name, "Bin 9");
    }
}
