//! Scheduler module for polling a host on a fixed cadence.

mod session;

pub use session::*;

use crate::config::PollConfig;
use crate::db::{PingRecord, Store};
use crate::probe::{ProbeExecutor, Reachability};

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;

/// A running polling session for one target.
///
/// Each tick probes the target, appends the result to the store, publishes
/// it to subscribers and then waits for the interval. The wait ends early
/// when [`PollingLoop::stop`] is called; a tick already in progress is
/// always finished first.
///
/// Only one loop should be active at a time. That is the caller's job
/// (see [`SessionManager`]); `start` does not check for other loops.
pub struct PollingLoop {
    config: PollConfig,
    stop_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PollingLoop {
    /// Spawn the loop on the current tokio runtime.
    pub fn start<R: Reachability>(
        config: PollConfig,
        store: Store,
        probe: Arc<ProbeExecutor<R>>,
        publisher: broadcast::Sender<PingRecord>,
    ) -> Self {
        let (stop_tx, stop_rx) = broadcast::channel(1);

        tracing::info!(
            "Polling loop: starting {} every {}s",
            config.target(),
            config.interval_seconds()
        );

        let handle = tokio::spawn(run_poll_loop(
            config.clone(),
            store,
            probe,
            publisher,
            stop_rx,
        ));

        Self {
            config,
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Whether the loop task is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for its task to exit.
    ///
    /// Returns once any in-flight probe, write and publish have completed.
    /// Calling this on a stopped loop does nothing.
    ///
    /// Cancel safe: the handle is only released once the task has been
    /// joined, so a cancelled `stop` leaves the loop tracked and a later
    /// call waits for it again.
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let _ = self.stop_tx.send(());

        let result = handle.await;
        self.handle = None;

        if let Err(e) = result {
            tracing::error!(
                "Polling loop for {} exited abnormally: {}",
                self.config.target(),
                e
            );
        }

        tracing::info!("Polling loop: stopped {}", self.config.target());
    }
}

impl Drop for PollingLoop {
    fn drop(&mut self) {
        // Dropped without stop(): signal the task but don't wait for it.
        if self.handle.is_some() {
            let _ = self.stop_tx.send(());
        }
    }
}

fn stop_requested(stop_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

/// Run the probe loop for a single target.
async fn run_poll_loop<R: Reachability>(
    config: PollConfig,
    store: Store,
    probe: Arc<ProbeExecutor<R>>,
    publisher: broadcast::Sender<PingRecord>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let interval = config.interval();

    loop {
        if stop_requested(&mut stop_rx) {
            break;
        }

        let classification = probe.probe(config.target()).await;
        let record = PingRecord::new(classification, config.target());

        store.append(&record);

        // Nobody listening is fine.
        let _ = publisher.send(record);

        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LogFilter;
    use crate::probe::{CheckOutput, Classification, ProbeError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Fails with an I/O error on the first call, then replies.
    pub(crate) struct Flaky {
        pub calls: Arc<AtomicUsize>,
    }

    impl Reachability for Flaky {
        async fn check(&self, target: &str, _timeout: Duration) -> Result<CheckOutput, ProbeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "boom").into());
            }
            Ok(CheckOutput {
                exited_ok: true,
                text: format!("64 bytes from {}: icmp_seq=1 ttl=64 time=1.0 ms", target),
            })
        }
    }

    /// Replies after `delay` and records how many checks overlap.
    pub(crate) struct Slow {
        pub delay: Duration,
        pub in_flight: Arc<AtomicUsize>,
        pub max_in_flight: Arc<AtomicUsize>,
    }

    impl Slow {
        pub fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Reachability for Slow {
        async fn check(&self, target: &str, _timeout: Duration) -> Result<CheckOutput, ProbeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(CheckOutput {
                exited_ok: true,
                text: format!("64 bytes from {}: icmp_seq=1 ttl=64 time=1500 ms", target),
            })
        }
    }

    fn flaky() -> (Arc<AtomicUsize>, Arc<ProbeExecutor<Flaky>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = ProbeExecutor::with_check(
            Flaky {
                calls: calls.clone(),
            },
            Duration::from_secs(3),
        );
        (calls, Arc::new(executor))
    }

    fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("ping_log.db"));
        (dir, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_does_not_end_loop() {
        let (_dir, store) = temp_store();
        let (_calls, probe) = flaky();
        let (tx, mut rx) = broadcast::channel(16);

        let mut poller = PollingLoop::start(
            PollConfig::new("192.168.0.1", 1).unwrap(),
            store.clone(),
            probe,
            tx,
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        poller.stop().await;

        assert_eq!(first.classification(), Classification::Failure);
        assert_eq!(second.classification(), Classification::Success);
        assert_eq!(second.target(), "192.168.0.1");

        let logs = store.query(&LogFilter::default());
        assert_eq!(logs.len(), 2);
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_stop_wakes_long_interval() {
        let (_dir, store) = temp_store();
        let (calls, probe) = flaky();
        let (tx, mut rx) = broadcast::channel(16);

        let mut poller = PollingLoop::start(
            PollConfig::new("10.0.0.1", 3600).unwrap(),
            store,
            probe,
            tx,
        );
        rx.recv().await.unwrap();

        let started = Instant::now();
        poller.stop().await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_right_after_start_is_prompt() {
        let (_dir, store) = temp_store();
        let (calls, probe) = flaky();
        let (tx, _rx) = broadcast::channel(16);

        let started = Instant::now();
        let mut poller = PollingLoop::start(
            PollConfig::new("10.0.0.1", 3600).unwrap(),
            store,
            probe,
            tx,
        );
        poller.stop().await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(calls.load(Ordering::SeqCst) <= 1);
        assert!(!poller.is_running());

        // Second stop is a no-op.
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_probe_finishes_tick() {
        let (_dir, store) = temp_store();
        let probe = Arc::new(ProbeExecutor::with_check(
            Slow::new(Duration::from_millis(1500)),
            Duration::from_secs(3),
        ));
        let (tx, mut rx) = broadcast::channel(16);

        let mut poller = PollingLoop::start(
            PollConfig::new("10.0.0.1", 3600).unwrap(),
            store.clone(),
            probe,
            tx,
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = tokio::time::Instant::now();
        poller.stop().await;
        let elapsed = started.elapsed();

        // The probe that was running when stop was called ran to completion.
        assert!(elapsed >= Duration::from_millis(1300));
        assert!(elapsed < Duration::from_secs(3));
        assert!(!poller.is_running());

        let stored = store.query(&LogFilter::default());
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record.classification(), Classification::Success);

        let published = rx.try_recv().unwrap();
        assert_eq!(published.target(), "10.0.0.1");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_stop_keeps_loop_tracked() {
        let (_dir, store) = temp_store();
        let slow = Slow::new(Duration::from_millis(1500));
        let in_flight = slow.in_flight.clone();
        let probe = Arc::new(ProbeExecutor::with_check(slow, Duration::from_secs(3)));
        let (tx, _rx) = broadcast::channel(16);

        let mut poller = PollingLoop::start(
            PollConfig::new("10.0.0.1", 1).unwrap(),
            store.clone(),
            probe,
            tx,
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        let cancelled = tokio::time::timeout(Duration::from_millis(100), poller.stop()).await;
        assert!(cancelled.is_err());
        assert!(poller.is_running());

        poller.stop().await;
        assert!(!poller.is_running());
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(store.query(&LogFilter::default()).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_published_in_order() {
        let (_dir, store) = temp_store();
        let (_calls, probe) = flaky();
        let (tx, mut rx) = broadcast::channel(16);

        let mut poller = PollingLoop::start(
            PollConfig::new("10.0.0.9", 2).unwrap(),
            store.clone(),
            probe,
            tx,
        );
        let mut published = Vec::new();
        for _ in 0..3 {
            published.push(rx.recv().await.unwrap());
        }
        poller.stop().await;

        // The store holds at least what was published, each exactly once.
        let stored = store.query(&LogFilter::default());
        assert!(stored.len() >= 3);
        assert_eq!(stored.iter().filter(|e| e.record.classification() == Classification::Failure).count(), 1);
        assert!(published.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }
}
