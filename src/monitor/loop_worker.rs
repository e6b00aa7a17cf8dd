use std::sync::Arc;

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::clock::{poll_ticker, Clock};
use super::controller::MonitorController;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Ticks between "still running" log lines.
const HEARTBEAT_EVERY_TICKS: u64 = 120;

pub async fn monitor_loop(
    controller: MonitorController,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = poll_ticker(poll_interval);
    let mut ticks: u64 = 0;
    let mut consecutive_skips: u32 = 0;

    log_info!(
        "monitor loop started, polling every {}s",
        poll_interval.as_secs_f32()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = controller.tick_at(clock.now()).await;
                ticks = ticks.wrapping_add(1);

                if report.skipped {
                    consecutive_skips = consecutive_skips.saturating_add(1);
                    if consecutive_skips % 10 == 0 {
                        log_warn!("{} consecutive monitor ticks skipped", consecutive_skips);
                    }
                    continue;
                }
                consecutive_skips = 0;

                if !report.alerted.is_empty() || !report.all_clean.is_empty() {
                    log_info!(
                        "tick {}: {} alerted, {} clean, {} not due",
                        ticks,
                        report.alerted.len(),
                        report.all_clean.len(),
                        report.not_due
                    );
                } else if ticks % HEARTBEAT_EVERY_TICKS == 0 {
                    log_info!("tick {}: {} sessions watched", ticks, report.not_due);
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("monitor loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Magnet, TransferSession, TransferStatus};
    use crate::monitor::ManualClock;
    use crate::notify::{BannerBoard, Dispatcher};
    use crate::source::InMemorySource;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    #[tokio::test]
    async fn loop_evaluates_until_cancelled() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let source = Arc::new(InMemorySource::new());
        source.upsert_session(TransferSession {
            id: "t-1".into(),
            route_id: "route-a".into(),
            source_name: "Godown 1".into(),
            destination_name: "Bin 2".into(),
            start_timestamp: start,
            cleaning_interval_seconds: 60,
            status: TransferStatus::Active,
        });
        source.add_route_magnet(
            "route-a",
            Magnet {
                id: "m1".into(),
                name: "Drum".into(),
            },
        );

        let board = BannerBoard::new();
        let controller = MonitorController::new(
            source,
            Arc::new(Dispatcher::new().with_sink(board.clone())),
            Duration::from_secs(1),
        );
        let clock = Arc::new(ManualClock::new(start + ChronoDuration::seconds(61)));
        let token = CancellationToken::new();

        let handle = tokio::spawn(monitor_loop(
            controller.clone(),
            clock,
            Duration::from_millis(5),
            token.clone(),
        ));

        // The first interval tick fires immediately.
        for _ in 0..200 {
            if controller.checkpoint("t-1").await == Some(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        token.cancel();
        handle.await.unwrap();

        assert_eq!(controller.checkpoint("t-1").await, Some(1));
        assert_eq!(board.len(), 1);
    }
}
