use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Banner state of one session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AlertState {
    #[default]
    NoAlert,
    Alerted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AlertCheckpoint {
    /// Highest interval index an alert decision has been made for.
    pub last_acknowledged_interval_index: i64,
    pub alert: AlertState,
}

impl AlertCheckpoint {
    /// Moves the checkpoint to `intervals_passed`. The index never goes
    /// backwards, even if the caller's clock does.
    pub fn advance(&mut self, intervals_passed: i64) {
        if intervals_passed > self.last_acknowledged_interval_index {
            self.last_acknowledged_interval_index = intervals_passed;
        }
    }
}

/// In-memory checkpoints keyed by session id. Nothing here is persisted;
/// after a restart every session starts again from index 0.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    entries: HashMap<String, AlertCheckpoint>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a zeroed entry. Returns `false` if the session already had one.
    pub fn register(&mut self, session_id: &str) -> bool {
        if self.entries.contains_key(session_id) {
            return false;
        }
        self.entries
            .insert(session_id.to_string(), AlertCheckpoint::default());
        true
    }

    pub fn remove(&mut self, session_id: &str) -> Option<AlertCheckpoint> {
        self.entries.remove(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&AlertCheckpoint> {
        self.entries.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut AlertCheckpoint> {
        self.entries.get_mut(session_id)
    }

    /// Current index for a session, 0 when the session has no entry yet.
    pub fn checkpoint(&self, session_id: &str) -> i64 {
        self.entries
            .get(session_id)
            .map(|entry| entry.last_acknowledged_interval_index)
            .unwrap_or(0)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
