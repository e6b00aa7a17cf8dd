pub mod cli;
pub mod db;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod settings;
pub mod source;
mod utils;

use std::{env, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use cli::{Cli, Command};
use db::Database;
use models::CleaningRecord;
use monitor::{MonitorController, SystemClock, TickReport};
use notify::{Banner, BannerBoard, DesktopNotifier, Dispatcher, LogSink};
use settings::{debug_mode, MonitorSettings, SettingsStore, SourceSettings, API_TOKEN_ENV, API_URL_ENV};
use source::{MonitorSource, RestSource, SourceSnapshot};

pub use utils::logging::init_logging;

const ENABLE_LOGS: bool = true;

pub struct AppState {
    pub settings: MonitorSettings,
    pub source: Arc<dyn MonitorSource>,
    pub banners: BannerBoard,
    pub monitor: MonitorController,
}

impl AppState {
    pub fn new(settings: MonitorSettings) -> Result<Self> {
        settings.validate().context("invalid settings")?;

        let source = build_source(&settings)?;
        let banners = BannerBoard::new();
        let dispatcher = Arc::new(build_dispatcher(&settings, &banners));
        let monitor = MonitorController::new(
            source.clone(),
            dispatcher,
            Duration::from_secs(settings.fetch_timeout_secs),
        );

        Ok(Self {
            settings,
            source,
            banners,
            monitor,
        })
    }
}

pub fn build_source(settings: &MonitorSettings) -> Result<Arc<dyn MonitorSource>> {
    let source: Arc<dyn MonitorSource> = match &settings.source {
        SourceSettings::Rest { base_url, token } => {
            log::info!("Reading transfer data from {base_url}");
            Arc::new(RestSource::new(
                base_url.clone(),
                token.clone(),
                Duration::from_secs(settings.fetch_timeout_secs),
            )?)
        }
        SourceSettings::Sqlite { path } => Arc::new(Database::new(path.clone())?),
    };
    Ok(source)
}

pub fn build_dispatcher(settings: &MonitorSettings, banners: &BannerBoard) -> Dispatcher {
    let mut dispatcher = Dispatcher::new().with_sink(LogSink).with_sink(banners.clone());

    if settings.desktop_notifications {
        dispatcher = dispatcher.with_sink(DesktopNotifier::default());
    }

    if settings.chime.enabled {
        #[cfg(feature = "chime")]
        {
            dispatcher = dispatcher.with_cue(notify::ChimeHandle::new(settings.chime.volume));
        }

        #[cfg(not(feature = "chime"))]
        {
            log::warn!("chime enabled in settings but this build has no audio support");
        }
    }

    log::info!("Reminder sinks: {}", dispatcher.sink_names().join(", "));
    dispatcher
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutput<'a> {
    report: &'a TickReport,
    banners: Vec<Banner>,
}

async fn run_monitor(settings: MonitorSettings) -> Result<()> {
    let app = AppState::new(settings)?;
    app.monitor
        .start(
            Arc::new(SystemClock),
            Duration::from_secs(app.settings.poll_interval_secs),
        )
        .await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    log_info!("Shutdown requested, stopping monitor");

    app.monitor.shutdown().await
}

async fn check_once(settings: MonitorSettings) -> Result<()> {
    let app = AppState::new(settings)?;
    let report = app.monitor.tick().await;
    if report.skipped {
        bail!("could not load transfer data, see log for details");
    }

    let output = CheckOutput {
        report: &report,
        banners: app.banners.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn record_clean(
    settings: MonitorSettings,
    magnet: String,
    session: Option<String>,
) -> Result<()> {
    let app = AppState::new(settings)?;
    let mut record = CleaningRecord::new(magnet, Utc::now());
    if let Some(session_id) = session {
        record = record.for_session(session_id);
    }

    app.source
        .record_cleaning(&record)
        .await
        .with_context(|| format!("failed to record cleaning of magnet {}", record.magnet_id))?;

    log_info!(
        "Recorded cleaning {} for magnet {} at {}",
        record.id,
        record.magnet_id,
        record.cleaning_timestamp.to_rfc3339()
    );
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Pulls one snapshot from the ERP API into the configured SQLite source.
/// Reads the settings file as written, without env overrides.
async fn sync_mirror(
    settings: &MonitorSettings,
    from: Option<String>,
    token: Option<String>,
) -> Result<()> {
    settings.validate().context("invalid settings")?;
    let SourceSettings::Sqlite { path } = &settings.source else {
        bail!("sync writes to a sqlite source; configure source.kind = \"sqlite\"");
    };

    let Some(from) = from.or_else(|| env::var(API_URL_ENV).ok()) else {
        bail!("no ERP API URL; pass --from or set {API_URL_ENV}");
    };
    let token = token.or_else(|| env::var(API_TOKEN_ENV).ok());
    let fetch_timeout = Duration::from_secs(settings.fetch_timeout_secs);
    let upstream = RestSource::new(from, token, fetch_timeout)?;
    let snapshot = tokio::time::timeout(fetch_timeout, SourceSnapshot::load(&upstream))
        .await
        .with_context(|| format!("timed out reading {}", upstream.base_url()))??;

    let database = Database::new(path.clone())?;
    let report = database.mirror_snapshot(&snapshot).await?;
    log_info!(
        "Synced {} sessions ({} deactivated), {} new cleanings into {}",
        report.sessions,
        report.deactivated,
        report.new_cleanings,
        database.path().display()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn write_settings(store: &SettingsStore) -> Result<()> {
    store.update(store.settings())?;
    log_info!("Settings written to {}", store.path().display());
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(debug_mode());
    log::info!("magnet-watch starting up...");

    let store = SettingsStore::new(cli.config.clone())?;
    let file_settings = store.settings();
    let mut settings = file_settings.clone();
    settings.apply_env_overrides();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let result = match cli.command {
            Command::Run => run_monitor(settings).await,
            Command::Check => check_once(settings).await,
            Command::RecordClean { magnet, session } => record_clean(settings, magnet, session).await,
            Command::Sync { from, token } => sync_mirror(&file_settings, from, token).await,
            // Env overrides are left out so tokens never land in the file.
            Command::Init => write_settings(&store),
        };

        if let Err(err) = &result {
            log_error!("command failed: {err:#}");
        }
        result
    })
}
