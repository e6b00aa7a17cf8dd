use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{MonitorError, MonitorResult},
    models::TransferSession,
    notify::{Dispatcher, Reminder},
    source::{MonitorSource, SourceSnapshot},
};

use super::{
    clock::Clock,
    evaluator::{evaluate, CleaningInterval, Decision, Evaluation, EvaluationInput},
    loop_worker::monitor_loop,
    state::{AlertCheckpoint, AlertState, CheckpointStore},
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Outcome of one monitor tick.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub at: DateTime<Utc>,
    /// The snapshot could not be loaded; nothing was evaluated.
    pub skipped: bool,
    pub registered: Vec<String>,
    pub stopped: Vec<String>,
    pub rejected: Vec<String>,
    pub not_due: usize,
    pub alerted: Vec<String>,
    pub all_clean: Vec<String>,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            skipped: false,
            registered: Vec::new(),
            stopped: Vec::new(),
            rejected: Vec::new(),
            not_due: 0,
            alerted: Vec::new(),
            all_clean: Vec::new(),
        }
    }

    fn skipped(at: DateTime<Utc>) -> Self {
        Self {
            skipped: true,
            ..Self::new(at)
        }
    }

    /// Sessions that reached an interval boundary this tick.
    pub fn evaluated(&self) -> usize {
        self.alerted.len() + self.all_clean.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionOrigin {
    /// Picked up from the source's active sessions; follows the source.
    Source,
    /// Registered through `register_session`; stays until `stop_session`.
    Manual,
}

struct WatchedSession {
    session: TransferSession,
    interval: CleaningInterval,
    origin: SessionOrigin,
}

#[derive(Default)]
struct MonitorState {
    sessions: HashMap<String, WatchedSession>,
    checkpoints: CheckpointStore,
    /// Active sessions refused at registration, so the warning fires once.
    rejected: HashSet<String>,
    /// Stopped by hand while the source still lists them as active. Not
    /// re-registered until the source stops listing them.
    dismissed: HashSet<String>,
}

impl MonitorState {
    fn insert(
        &mut self,
        session: TransferSession,
        interval: CleaningInterval,
        origin: SessionOrigin,
    ) -> bool {
        let id = session.id.clone();
        let created = self.checkpoints.register(&id);
        self.sessions.insert(
            id,
            WatchedSession {
                session,
                interval,
                origin,
            },
        );
        created
    }

    fn origin(&self, session_id: &str) -> Option<SessionOrigin> {
        self.sessions.get(session_id).map(|watched| watched.origin)
    }

    fn remove(&mut self, session_id: &str) -> Option<AlertCheckpoint> {
        self.sessions.remove(session_id);
        self.checkpoints.remove(session_id)
    }
}

/// Owns the checkpoint store and drives evaluation for every registered
/// transfer session.
///
/// Each tick registers newly active sessions from the source and stops those
/// the source no longer lists as active. Sessions registered by hand are
/// left out of that sweep and only end through `stop_session`, which in turn
/// keeps a still-active source session from coming straight back.
#[derive(Clone)]
pub struct MonitorController {
    state: Arc<Mutex<MonitorState>>,
    source: Arc<dyn MonitorSource>,
    dispatcher: Arc<Dispatcher>,
    fetch_timeout: Duration,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel_token: Arc<Mutex<Option<CancellationToken>>>,
}

impl MonitorController {
    pub fn new(
        source: Arc<dyn MonitorSource>,
        dispatcher: Arc<Dispatcher>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState::default())),
            source,
            dispatcher,
            fetch_timeout,
            ticker: Arc::new(Mutex::new(None)),
            cancel_token: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts watching a session until `stop_session`, whether or not the
    /// source lists it. Fails fast on a non-positive cleaning interval.
    /// Returns `false` if the session was already registered, in which case
    /// its checkpoint is kept.
    pub async fn register_session(&self, session: TransferSession) -> MonitorResult<bool> {
        let interval = CleaningInterval::for_session(&session)?;
        let mut state = self.state.lock().await;
        state.rejected.remove(&session.id);
        state.dismissed.remove(&session.id);
        let created = state.insert(session, interval, SessionOrigin::Manual);
        Ok(created)
    }

    /// Stops watching a session, drops its checkpoint and clears any banner.
    /// A session the source still lists as active stays stopped until the
    /// source drops it or it is registered again.
    pub async fn stop_session(&self, session_id: &str) -> MonitorResult<()> {
        let mut state = self.state.lock().await;
        if state.remove(session_id).is_none() {
            return Err(MonitorError::unknown_session(session_id));
        }
        state.dismissed.insert(session_id.to_string());
        self.dispatcher.clear(session_id);
        Ok(())
    }

    pub async fn checkpoint(&self, session_id: &str) -> Option<i64> {
        let state = self.state.lock().await;
        state
            .checkpoints
            .get(session_id)
            .map(|entry| entry.last_acknowledged_interval_index)
    }

    pub async fn alert_state(&self, session_id: &str) -> Option<AlertState> {
        let state = self.state.lock().await;
        state.checkpoints.get(session_id).map(|entry| entry.alert)
    }

    pub async fn registered_sessions(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Loads a fresh snapshot and evaluates every registered session at
    /// `now`. A failed or timed out fetch skips the tick without touching
    /// any state.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let snapshot = match time::timeout(
            self.fetch_timeout,
            SourceSnapshot::load(self.source.as_ref()),
        )
        .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => {
                log_warn!("monitor tick skipped, fetch failed: {err:#}");
                return TickReport::skipped(now);
            }
            Err(_) => {
                log_warn!(
                    "monitor tick skipped, fetch timed out (> {}s)",
                    self.fetch_timeout.as_secs_f32()
                );
                return TickReport::skipped(now);
            }
        };

        let mut report = TickReport::new(now);
        let mut state = self.state.lock().await;

        self.sync_sessions(&mut state, &snapshot, &mut report);

        let mut ids: Vec<String> = state.sessions.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let evaluation = {
                let Some(watched) = state.sessions.get(&id) else {
                    continue;
                };
                let input = EvaluationInput {
                    session: &watched.session,
                    interval: watched.interval,
                    now,
                    mappings: &snapshot.mappings,
                    magnets: &snapshot.magnets,
                    records: &snapshot.records,
                    checkpoint: state.checkpoints.checkpoint(&id),
                };
                evaluate(&input)
            };

            match evaluation {
                Evaluation::NotDue { .. } => report.not_due += 1,
                Evaluation::Due(decision) => {
                    if let Some(entry) = state.checkpoints.get_mut(&id) {
                        self.apply_decision(entry, &decision, &mut report);
                    }
                }
            }
        }

        report
    }

    fn apply_decision(
        &self,
        entry: &mut AlertCheckpoint,
        decision: &Decision,
        report: &mut TickReport,
    ) {
        if decision.is_clean() {
            self.dispatcher.clear(&decision.session_id);
            entry.alert = AlertState::NoAlert;
            report.all_clean.push(decision.session_id.clone());
        } else {
            let reminder = Reminder::from_decision(decision);
            log_info!(
                "session {}: {} of {} magnets overdue at interval {}",
                decision.session_id,
                reminder.uncleaned,
                reminder.total,
                decision.intervals_passed
            );
            self.dispatcher.alert(&reminder);
            entry.alert = AlertState::Alerted;
            report.alerted.push(decision.session_id.clone());
        }

        // Advances on alerting ticks too; the next window starts here.
        entry.advance(decision.intervals_passed);
    }

    fn sync_sessions(
        &self,
        state: &mut MonitorState,
        snapshot: &SourceSnapshot,
        report: &mut TickReport,
    ) {
        let active: HashMap<&str, &TransferSession> = snapshot
            .active_sessions()
            .map(|session| (session.id.as_str(), session))
            .collect();

        let mut gone: Vec<String> = state
            .sessions
            .iter()
            .filter(|(id, watched)| {
                watched.origin == SessionOrigin::Source && !active.contains_key(id.as_str())
            })
            .map(|(id, _)| id.clone())
            .collect();
        gone.sort();
        for id in gone {
            state.remove(&id);
            self.dispatcher.clear(&id);
            log_info!("session {id} no longer active, checkpoint dropped");
            report.stopped.push(id);
        }

        state
            .rejected
            .retain(|id| active.contains_key(id.as_str()));
        state
            .dismissed
            .retain(|id| active.contains_key(id.as_str()));

        let mut incoming: Vec<&TransferSession> = active.values().copied().collect();
        incoming.sort_by(|a, b| a.id.cmp(&b.id));

        for session in incoming {
            if state.dismissed.contains(&session.id)
                || state.origin(&session.id) == Some(SessionOrigin::Manual)
            {
                continue;
            }

            let interval = match CleaningInterval::for_session(session) {
                Ok(interval) => interval,
                Err(err) => {
                    if state.sessions.contains_key(&session.id) {
                        log_warn!("ignoring update for {}: {err}", session.id);
                    } else if state.rejected.insert(session.id.clone()) {
                        log_warn!("rejected session registration: {err}");
                        report.rejected.push(session.id.clone());
                    }
                    continue;
                }
            };

            if state.insert(session.clone(), interval, SessionOrigin::Source) {
                log_info!(
                    "watching session {} ({} -> {}), cleaning every {}s",
                    session.id,
                    session.source_name,
                    session.destination_name,
                    interval.seconds()
                );
                report.registered.push(session.id.clone());
            }
        }
    }

    /// Spawns the polling loop. Fails if one is already running.
    pub async fn start(&self, clock: Arc<dyn Clock>, poll_interval: Duration) -> Result<()> {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard.is_some() {
            bail!("monitor already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(
            self.clone(),
            clock,
            poll_interval,
            cancel_token.clone(),
        ));

        *ticker_guard = Some(handle);
        *self.cancel_token.lock().await = Some(cancel_token);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Cancels the polling loop and waits for it to finish.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(token) = self.cancel_token.lock().await.take() {
            token.cancel();
        }

        let handle = self.ticker.lock().await.take();
        if let Some(handle) = handle {
            handle.await.context("monitor loop task failed to join")?;
        }
        Ok(())
    }
}
