//! Transfer session data model.
//!
//! A transfer session moves material from a source godown or bin into a
//! destination bin along a route that carries one or more magnets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TransferStatus {
    #[default]
    Active,
    Stopped,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Active => "Active",
            TransferStatus::Stopped => "Stopped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferSession {
    pub id: String,
    /// Key into the route/magnet mapping table.
    pub route_id: String,
    pub source_name: String,
    pub destination_name: String,
    pub start_timestamp: DateTime<Utc>,
    /// Configured cleaning cadence. Signed because upstream data is not
    /// trusted; it is validated when the session is registered.
    pub cleaning_interval_seconds: i64,
    pub status: TransferStatus,
}

impl TransferSession {
    pub fn is_active(&self) -> bool {
        self.status == TransferStatus::Active
    }
}
