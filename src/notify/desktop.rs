//! Native desktop alerts for hosts without a banner UI.
//!
//! Uses `notify-send` on Linux and `osascript` on macOS. OS notifications
//! cannot be withdrawn, so `clear` does nothing.

use std::process::Command;
use std::thread;

use anyhow::{anyhow, Context, Result};
use log::warn;

use super::{Reminder, ReminderSink};

#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("magnet-watch")
    }
}

impl ReminderSink for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn show(&self, reminder: &Reminder) -> Result<()> {
        let title = reminder.title.clone();
        let body = reminder.message.clone();
        let app_name = self.app_name.clone();

        // The notifier binaries can block for a while; keep them off the tick.
        thread::Builder::new()
            .name("desktop-notify".into())
            .spawn(move || {
                let result = if cfg!(target_os = "macos") {
                    send_macos_notification(&title, &body)
                } else {
                    send_linux_notification(&app_name, &title, &body)
                };
                if let Err(err) = result {
                    warn!("desktop notification failed: {err:#}");
                }
            })
            .context("failed to spawn desktop notification thread")?;
        Ok(())
    }

    fn clear(&self, _session_key: &str) -> Result<()> {
        Ok(())
    }
}

fn send_linux_notification(app_name: &str, title: &str, body: &str) -> Result<()> {
    let output = Command::new("notify-send")
        .arg("--urgency=critical")
        .arg(format!("--app-name={app_name}"))
        .arg(title)
        .arg(body)
        .output()
        .context("notify-send failed")?;

    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!("notify-send exited with: {}", output.status))
    }
}

fn send_macos_notification(title: &str, body: &str) -> Result<()> {
    let script = format!(
        r#"display notification "{}" with title "{}" sound name "Glass""#,
        escape_applescript_string(body),
        escape_applescript_string(title)
    );

    let output = Command::new("osascript")
        .arg("-e")
        .arg(&script)
        .output()
        .context("osascript failed")?;

    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!("osascript exited with: {}", output.status))
    }
}

fn escape_applescript_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(
            escape_applescript_string(r#"Bin "4" \ Godown"#),
            r#"Bin \"4\" \\ Godown"#
        );
    }

    #[test]
    fn clear_is_a_no_op() {
        assert!(DesktopNotifier::default().clear("t-1").is_ok());
    }
}
