use crate::monitor::Decision;

use super::Reminder;

/// Renders whole seconds as `XmYs`, e.g. `2m30s`. Negative input renders
/// as `0m0s`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}m{}s", seconds / 60, seconds % 60)
}

pub fn reminder_title(decision: &Decision) -> String {
    format!(
        "Magnet cleaning due: {} -> {}",
        decision.source_name, decision.destination_name
    )
}

pub fn reminder_body(decision: &Decision) -> String {
    format!(
        "{} -> {}: {} of {} magnets not cleaned ({}). Elapsed {}, cleaning interval {}.",
        decision.source_name,
        decision.destination_name,
        decision.uncleaned.len(),
        decision.total(),
        decision.uncleaned_names().join(", "),
        format_duration(decision.elapsed_seconds()),
        format_duration(decision.interval.seconds()),
    )
}

impl Reminder {
    pub fn from_decision(decision: &Decision) -> Self {
        Self {
            session_key: decision.session_id.clone(),
            title: reminder_title(decision),
            message: reminder_body(decision),
            uncleaned: decision.uncleaned.len(),
            total: decision.total(),
            magnet_names: decision.uncleaned_names(),
        }
    }
}
