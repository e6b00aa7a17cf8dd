//! Reminder delivery.
//!
//! The monitor hands a [`Reminder`] to the [`Dispatcher`], which fans it out
//! to every configured [`ReminderSink`] and plays the optional [`AudioCue`].
//! Delivery is best-effort: failures are logged and never reach the
//! monitor's checkpoint bookkeeping.

pub mod banner;
#[cfg(feature = "chime")]
pub mod chime;
pub mod desktop;
pub mod format;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub use banner::{Banner, BannerBoard};
#[cfg(feature = "chime")]
pub use chime::ChimeHandle;
pub use desktop::DesktopNotifier;
pub use format::format_duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Transfer session id; sinks key their banners by it.
    pub session_key: String,
    pub title: String,
    pub message: String,
    pub uncleaned: usize,
    pub total: usize,
    pub magnet_names: Vec<String>,
}

/// Presentation backend for reminders.
///
/// `show` must replace an existing reminder for the same session key rather
/// than stack a second one; `clear` removes it and is a no-op when nothing is
/// shown.
pub trait ReminderSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn show(&self, reminder: &Reminder) -> Result<()>;

    fn clear(&self, session_key: &str) -> Result<()>;
}

pub trait AudioCue: Send + Sync {
    fn play(&self) -> Result<()>;
}

/// Writes reminders to the log. Always installed so headless runs leave a
/// trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReminderSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn show(&self, reminder: &Reminder) -> Result<()> {
        warn!("[reminder] {}: {}", reminder.session_key, reminder.message);
        Ok(())
    }

    fn clear(&self, session_key: &str) -> Result<()> {
        info!("[reminder] {session_key}: all magnets clean");
        Ok(())
    }
}

#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<Box<dyn ReminderSink>>,
    cue: Option<Box<dyn AudioCue>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl ReminderSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_cue(mut self, cue: impl AudioCue + 'static) -> Self {
        self.cue = Some(Box::new(cue));
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub fn alert(&self, reminder: &Reminder) {
        for sink in &self.sinks {
            if let Err(err) = sink.show(reminder) {
                warn!(
                    "{} sink failed to show reminder for {}: {err:#}",
                    sink.name(),
                    reminder.session_key
                );
            }
        }

        if let Some(cue) = &self.cue {
            if let Err(err) = cue.play() {
                warn!("audio cue unavailable: {err:#}");
            }
        }
    }

    pub fn clear(&self, session_key: &str) {
        for sink in &self.sinks {
            if let Err(err) = sink.clear(session_key) {
                warn!(
                    "{} sink failed to clear reminder for {session_key}: {err:#}",
                    sink.name()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct BrokenSink;

    impl ReminderSink for BrokenSink {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn show(&self, _reminder: &Reminder) -> Result<()> {
            Err(anyhow!("display detached"))
        }

        fn clear(&self, _session_key: &str) -> Result<()> {
            Err(anyhow!("display detached"))
        }
    }

    #[derive(Clone, Default)]
    struct CountingCue(Arc<AtomicUsize>);

    impl AudioCue for CountingCue {
        fn play(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("autoplay blocked"))
        }
    }

    fn reminder(key: &str) -> Reminder {
        Reminder {
            session_key: key.into(),
            title: "Magnet cleaning due".into(),
            message: "1 of 1 magnets not cleaned".into(),
            uncleaned: 1,
            total: 1,
            magnet_names: vec!["Drum".into()],
        }
    }

    #[test]
    fn failing_sink_does_not_block_the_others() {
        let board = BannerBoard::new();
        let cue = CountingCue::default();
        let dispatcher = Dispatcher::new()
            .with_sink(BrokenSink)
            .with_sink(board.clone())
            .with_cue(cue.clone());

        dispatcher.alert(&reminder("t-1"));

        assert_eq!(board.len(), 1);
        assert_eq!(cue.0.load(Ordering::SeqCst), 1);

        dispatcher.clear("t-1");
        assert!(board.is_empty());
    }

    #[test]
    fn lists_sinks_in_install_order() {
        let dispatcher = Dispatcher::new()
            .with_sink(LogSink)
            .with_sink(BannerBoard::new());
        assert_eq!(dispatcher.sink_names(), vec!["log", "banner"]);
    }
}
