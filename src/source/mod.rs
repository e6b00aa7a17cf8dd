//! Data sources the monitor reads from.
//!
//! The monitor never talks to a backend directly: each tick it loads a
//! [`SourceSnapshot`] through a [`MonitorSource`] and evaluates against that.

pub mod http;
pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::{CleaningRecord, Magnet, MagnetMapping, TransferSession};

pub use http::RestSource;
pub use memory::InMemorySource;
pub use sqlite::MirrorReport;

#[async_trait]
pub trait MonitorSource: Send + Sync {
    /// All known transfer sessions, active or stopped.
    async fn transfer_sessions(&self) -> Result<Vec<TransferSession>>;

    async fn magnet_mappings(&self) -> Result<Vec<MagnetMapping>>;

    async fn magnets(&self) -> Result<Vec<Magnet>>;

    async fn cleaning_records(&self) -> Result<Vec<CleaningRecord>>;

    /// Appends a "magnet cleaned" event.
    async fn record_cleaning(&self, record: &CleaningRecord) -> Result<()>;
}

/// Everything one tick needs, fetched up front so evaluation never waits on
/// I/O.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub sessions: Vec<TransferSession>,
    pub mappings: Vec<MagnetMapping>,
    pub magnets: HashMap<String, Magnet>,
    pub records: Vec<CleaningRecord>,
}

impl SourceSnapshot {
    pub async fn load(source: &dyn MonitorSource) -> Result<Self> {
        let (sessions, mappings, magnets, records) = tokio::try_join!(
            async {
                source
                    .transfer_sessions()
                    .await
                    .context("failed to fetch transfer sessions")
            },
            async {
                source
                    .magnet_mappings()
                    .await
                    .context("failed to fetch magnet mappings")
            },
            async { source.magnets().await.context("failed to fetch magnets") },
            async {
                source
                    .cleaning_records()
                    .await
                    .context("failed to fetch cleaning records")
            },
        )?;

        Ok(Self {
            sessions,
            mappings,
            magnets: magnets
                .into_iter()
                .map(|magnet| (magnet.id.clone(), magnet))
                .collect(),
            records,
        })
    }

    pub fn active_sessions(&self) -> impl Iterator<Item = &TransferSession> {
        self.sessions.iter().filter(|session| session.is_active())
    }
}
