// End-to-end monitor flow through the public API.
//
// Run with: cargo test --test monitor_flow

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use magnet_watch::models::{CleaningRecord, Magnet, TransferSession, TransferStatus};
use magnet_watch::monitor::{AlertState, MonitorController};
use magnet_watch::notify::{BannerBoard, Dispatcher};
use magnet_watch::settings::{ChimeSettings, MonitorSettings, SourceSettings};
use magnet_watch::source::InMemorySource;
use magnet_watch::{build_dispatcher, AppState};
use tempfile::TempDir;

const ROUTE: &str = "route-7";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap()
}

fn at(seconds: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::seconds(seconds)
}

fn transfer(id: &str) -> TransferSession {
    TransferSession {
        id: id.to_string(),
        route_id: ROUTE.to_string(),
        source_name: "Godown 1".to_string(),
        destination_name: "Precleaning Bin 3".to_string(),
        start_timestamp: t0(),
        cleaning_interval_seconds: 60,
        status: TransferStatus::Active,
    }
}

fn cleaned(magnet_id: &str, seconds: i64) -> CleaningRecord {
    CleaningRecord::new(magnet_id, at(seconds))
}

/// Source with one active session on a route carrying three magnets.
fn mill() -> (Arc<InMemorySource>, BannerBoard, MonitorController) {
    let source = Arc::new(InMemorySource::new());
    source.upsert_session(transfer("t-1"));
    for (id, name) in [("m1", "Drum"), ("m2", "Plate"), ("m3", "Grate")] {
        source.add_route_magnet(
            ROUTE,
            Magnet {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }

    let board = BannerBoard::new();
    let dispatcher = Arc::new(Dispatcher::new().with_sink(board.clone()));
    let controller = MonitorController::new(source.clone(), dispatcher, Duration::from_secs(5));
    (source, board, controller)
}

#[tokio::test]
async fn three_dirty_magnets_are_all_reported() {
    let (source, board, controller) = mill();
    // Two magnets cleaned before the session started, one never cleaned.
    source.push_record(CleaningRecord::new("m1", t0() - ChronoDuration::seconds(30)));
    source.push_record(CleaningRecord::new("m2", t0() - ChronoDuration::seconds(10)));

    let report = controller.tick_at(at(150)).await;
    assert_eq!(report.alerted, vec!["t-1"]);
    assert_eq!(controller.checkpoint("t-1").await, Some(2));
    assert_eq!(controller.alert_state("t-1").await, Some(AlertState::Alerted));

    let banner = board.get("t-1").expect("banner shown");
    assert!(banner.message.contains("3 of 3"));
    for name in ["Drum", "Plate", "Grate"] {
        assert!(banner.message.contains(name), "missing {name}");
    }
}

#[tokio::test]
async fn all_clean_clears_banner_and_still_advances() {
    let (source, board, controller) = mill();

    controller.tick_at(at(61)).await;
    assert_eq!(board.len(), 1);
    assert_eq!(controller.checkpoint("t-1").await, Some(1));

    // Cleaned exactly at the last alert time counts.
    for magnet in ["m1", "m2", "m3"] {
        source.push_record(cleaned(magnet, 60));
    }

    let report = controller.tick_at(at(125)).await;
    assert_eq!(report.all_clean, vec!["t-1"]);
    assert!(report.alerted.is_empty());
    assert!(board.is_empty());
    assert_eq!(controller.checkpoint("t-1").await, Some(2));
    assert_eq!(controller.alert_state("t-1").await, Some(AlertState::NoAlert));
}

#[tokio::test]
async fn checkpoint_never_decreases_across_ticks() {
    let (source, _board, controller) = mill();
    let mut last = 0;
    for (i, seconds) in [10, 61, 61, 90, 200, 200, 241, 600].into_iter().enumerate() {
        if i == 4 {
            source.push_record(cleaned("m1", seconds));
        }
        controller.tick_at(at(seconds)).await;
        let checkpoint = controller.checkpoint("t-1").await.unwrap_or(0);
        assert!(checkpoint >= last);
        last = checkpoint;
    }
    assert_eq!(last, 10);
}

#[tokio::test]
async fn stopped_session_restarts_from_zero() {
    let (source, board, controller) = mill();

    controller.tick_at(at(130)).await;
    assert_eq!(controller.checkpoint("t-1").await, Some(2));

    source.set_session_status("t-1", TransferStatus::Stopped);
    let report = controller.tick_at(at(140)).await;
    assert_eq!(report.stopped, vec!["t-1"]);
    assert!(controller.checkpoint("t-1").await.is_none());
    assert!(board.is_empty());

    source.set_session_status("t-1", TransferStatus::Active);
    let report = controller.tick_at(at(141)).await;
    assert_eq!(report.registered, vec!["t-1"]);
    // Fresh entry at 0, so the session is immediately due again.
    assert_eq!(report.alerted, vec!["t-1"]);
    assert_eq!(controller.checkpoint("t-1").await, Some(2));
}

#[tokio::test]
async fn source_outage_skips_ticks_without_state_change() {
    let (source, board, controller) = mill();
    controller.tick_at(at(61)).await;

    source.set_failing(true);
    let report = controller.tick_at(at(300)).await;
    assert!(report.skipped);
    assert_eq!(controller.checkpoint("t-1").await, Some(1));
    assert_eq!(board.get("t-1").map(|b| b.repeats), Some(0));

    source.set_failing(false);
    controller.tick_at(at(300)).await;
    assert_eq!(controller.checkpoint("t-1").await, Some(5));
}

#[tokio::test]
async fn app_state_over_sqlite_records_cleanings() {
    let dir = TempDir::new().unwrap();
    let settings = MonitorSettings {
        source: SourceSettings::Sqlite {
            path: dir.path().join("mill.sqlite3"),
        },
        chime: ChimeSettings {
            enabled: false,
            volume: 0.0,
        },
        ..MonitorSettings::default()
    };

    let app = AppState::new(settings).unwrap();
    let record = CleaningRecord::new("m1", at(30)).for_session("t-1");
    app.source.record_cleaning(&record).await.unwrap();

    let records = app.source.cleaning_records().await.unwrap();
    assert_eq!(records, vec![record]);

    let report = app.monitor.tick().await;
    assert!(!report.skipped);
    assert!(report.registered.is_empty());
}

#[test]
fn app_state_rejects_invalid_settings() {
    let settings = MonitorSettings {
        poll_interval_secs: 0,
        ..MonitorSettings::default()
    };
    assert!(AppState::new(settings).is_err());
}

#[test]
fn dispatcher_follows_settings() {
    let board = BannerBoard::new();
    let mut settings = MonitorSettings {
        chime: ChimeSettings {
            enabled: false,
            volume: 0.0,
        },
        ..MonitorSettings::default()
    };

    let dispatcher = build_dispatcher(&settings, &board);
    assert_eq!(dispatcher.sink_names(), vec!["log", "banner"]);

    settings.desktop_notifications = true;
    let dispatcher = build_dispatcher(&settings, &board);
    assert_eq!(dispatcher.sink_names(), vec!["log", "banner", "desktop"]);
}
