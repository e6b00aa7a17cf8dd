use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Reminder, ReminderSink};

/// One on-screen reminder, keyed by transfer session.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub session_key: String,
    pub title: String,
    pub message: String,
    pub first_shown_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// How many times the reminder fired while the banner stayed up.
    pub repeats: u32,
}

/// Shared banner map that UI hosts render from. At most one banner per
/// session key.
#[derive(Debug, Clone, Default)]
pub struct BannerBoard {
    banners: Arc<RwLock<BTreeMap<String, Banner>>>,
}

impl BannerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Banner>> {
        match self.banners.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Banner>> {
        match self.banners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, session_key: &str) -> Option<Banner> {
        self.read().get(session_key).cloned()
    }

    /// Banners ordered by session key.
    pub fn snapshot(&self) -> Vec<Banner> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl ReminderSink for BannerBoard {
    fn name(&self) -> &'static str {
        "banner"
    }

    fn show(&self, reminder: &Reminder) -> Result<()> {
        let now = Utc::now();
        let mut banners = self.write();
        banners
            .entry(reminder.session_key.clone())
            .and_modify(|banner| {
                banner.title = reminder.title.clone();
                banner.message = reminder.message.clone();
                banner.updated_at = now;
                banner.repeats = banner.repeats.saturating_add(1);
            })
            .or_insert_with(|| Banner {
                session_key: reminder.session_key.clone(),
                title: reminder.title.clone(),
                message: reminder.message.clone(),
                first_shown_at: now,
                updated_at: now,
                repeats: 0,
            });
        Ok(())
    }

    fn clear(&self, session_key: &str) -> Result<()> {
        self.write().remove(session_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(key: &str, message: &str) -> Reminder {
        Reminder {
            session_key: key.into(),
            title: "Magnet cleaning due".into(),
            message: message.into(),
            uncleaned: 1,
            total: 2,
            magnet_names: vec!["Drum".into()],
        }
    }

    #[test]
    fn repeated_reminder_replaces_banner() {
        let board = BannerBoard::new();
        board.show(&reminder("t-1", "first")).unwrap();
        board.show(&reminder("t-1", "second")).unwrap();

        assert_eq!(board.len(), 1);
        let banner = board.get("t-1").unwrap();
        assert_eq!(banner.message, "second");
        assert_eq!(banner.repeats, 1);
        assert!(banner.updated_at >= banner.first_shown_at);
    }

    #[test]
    fn clear_only_touches_its_session() {
        let board = BannerBoard::new();
        board.show(&reminder("t-1", "one")).unwrap();
        board.show(&reminder("t-2", "two")).unwrap();

        board.clear("t-1").unwrap();
        board.clear("t-unknown").unwrap();

        let keys: Vec<_> = board
            .snapshot()
            .into_iter()
            .map(|banner| banner.session_key)
            .collect();
        assert_eq!(keys, vec!["t-2"]);
    }
}
