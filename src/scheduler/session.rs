//! Session controller: at most one polling loop per process.

use super::PollingLoop;
use crate::config::{ConfigError, PollConfig};
use crate::db::{LogEntry, LogFilter, PingRecord, Store};
use crate::probe::{ProbeExecutor, Reachability, SystemPing};

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Subscriber buffer; slow subscribers see `RecvError::Lagged`.
const EVENT_BUFFER: usize = 256;

/// Snapshot of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub running: bool,
    pub target: Option<String>,
    pub interval_seconds: Option<u64>,
}

impl SessionStatus {
    fn idle() -> Self {
        Self {
            running: false,
            target: None,
            interval_seconds: None,
        }
    }

    fn of(poller: &PollingLoop) -> Self {
        Self {
            running: poller.is_running(),
            target: Some(poller.config().target().to_string()),
            interval_seconds: Some(poller.config().interval_seconds()),
        }
    }
}

/// Owns the store, the subscriber channel and the active polling loop.
pub struct SessionManager<R: Reachability = SystemPing> {
    store: Store,
    probe: Arc<ProbeExecutor<R>>,
    events: broadcast::Sender<PingRecord>,
    active: Mutex<Option<PollingLoop>>,
}

impl<R: Reachability> SessionManager<R> {
    pub fn new(store: Store, probe: ProbeExecutor<R>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            probe: Arc::new(probe),
            events,
            active: Mutex::new(None),
        }
    }

    /// Receive every record published from now on, across sessions.
    pub fn subscribe(&self) -> broadcast::Receiver<PingRecord> {
        self.events.subscribe()
    }

    /// Start polling `target`, replacing any running session.
    ///
    /// The configuration is checked first; a rejected start leaves the
    /// current session untouched. Otherwise the previous loop is stopped
    /// and joined before the new one begins.
    pub async fn start_session(
        &self,
        target: &str,
        interval_seconds: u64,
    ) -> Result<SessionStatus, ConfigError> {
        let config = PollConfig::new(target, interval_seconds)?;

        // The previous loop stays in the slot until it has been joined.
        let mut active = self.active.lock().await;
        if let Some(previous) = active.as_mut() {
            previous.stop().await;
        }

        let poller = PollingLoop::start(
            config,
            self.store.clone(),
            self.probe.clone(),
            self.events.clone(),
        );
        let status = SessionStatus::of(&poller);
        *active = Some(poller);

        Ok(status)
    }

    /// Stop the running session, if any, and wait for it to exit.
    pub async fn stop_session(&self) {
        let mut active = self.active.lock().await;
        if let Some(poller) = active.as_mut() {
            poller.stop().await;
        }
        *active = None;
    }

    pub async fn status(&self) -> SessionStatus {
        let active = self.active.lock().await;
        active.as_ref().map_or_else(SessionStatus::idle, SessionStatus::of)
    }

    pub fn query_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.store.query(filter)
    }

    pub fn delete_logs(&self, ids: &[i64]) {
        self.store.delete(ids);
    }
}
