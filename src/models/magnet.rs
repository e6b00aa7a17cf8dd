use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical cleaning point along a transfer route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Magnet {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MagnetMapping {
    pub magnet_id: String,
    pub route_id: String,
}

/// One "magnet cleaned" event. Records are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleaningRecord {
    pub id: String,
    pub magnet_id: String,
    pub cleaning_timestamp: DateTime<Utc>,
    pub transfer_session_id: Option<String>,
}

impl CleaningRecord {
    pub fn new(magnet_id: impl Into<String>, cleaning_timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            magnet_id: magnet_id.into(),
            cleaning_timestamp,
            transfer_session_id: None,
        }
    }

    pub fn for_session(mut self, session_id: impl Into<String>) -> Self {
        self.transfer_session_id = Some(session_id.into());
        self
    }
}
