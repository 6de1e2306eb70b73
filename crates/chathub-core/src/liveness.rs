//! Per-session heartbeat probes and latency sampling.
//!
//! Every live session gets a ticker task that pushes `ping-check` probes into
//! its outbox. The client echoes the timestamp back with `pong-check` and the
//! difference becomes a latency sample. With a timeout configured, a session
//! that stays silent longer than the timeout is asked to close.

use crate::message::now_millis;
use crate::session::{Outbound, Outbox, SessionId};
use chathub_protocol::ServerEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

/// Default probe interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5_000);

/// Sentinel for "no latency sample yet".
const NO_SAMPLE: u64 = u64::MAX;

/// Liveness bookkeeping shared between a session and its ticker.
#[derive(Debug)]
pub struct LivenessState {
    last_heard: Mutex<Instant>,
    last_latency_ms: AtomicU64,
}

impl LivenessState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_heard: Mutex::new(Instant::now()),
            last_latency_ms: AtomicU64::new(NO_SAMPLE),
        }
    }

    /// Record an echoed probe received at `now_ms` and return the latency.
    pub fn record_echo(&self, echoed_ms: u64, now_ms: u64) -> u64 {
        let latency = now_ms.saturating_sub(echoed_ms);
        *self.last_heard.lock() = Instant::now();
        self.last_latency_ms.store(latency, Ordering::Relaxed);
        latency
    }

    /// Most recent latency sample in milliseconds.
    #[must_use]
    pub fn last_latency(&self) -> Option<u64> {
        match self.last_latency_ms.load(Ordering::Relaxed) {
            NO_SAMPLE => None,
            ms => Some(ms),
        }
    }

    /// Time since the last echo, or since creation if none arrived.
    #[must_use]
    pub fn silent_for(&self) -> Duration {
        self.last_heard.lock().elapsed()
    }
}

impl Default for LivenessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned handle to a session's ticker task. Dropping it stops the ticker.
#[derive(Debug)]
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Stop the ticker.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns heartbeat tickers.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    interval: Duration,
    timeout: Option<Duration>,
}

impl LivenessMonitor {
    /// Create a monitor. A zero interval disables probing.
    #[must_use]
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Start probing a session.
    ///
    /// Must be called from within a Tokio runtime. Returns `None` when
    /// probing is disabled.
    #[must_use]
    pub fn start(
        &self,
        session_id: SessionId,
        outbox: Outbox,
        state: Arc<LivenessState>,
    ) -> Option<HeartbeatHandle> {
        if !self.is_enabled() {
            return None;
        }

        let interval = self.interval;
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if let Some(timeout) = timeout {
                    if state.silent_for() > timeout {
                        info!(session = %session_id, "Heartbeat timed out, closing session");
                        let _ = outbox.send(Outbound::Close);
                        break;
                    }
                }

                let probe = Arc::new(ServerEvent::PingCheck(now_millis()));
                if outbox.send(Outbound::Event(probe)).is_err() {
                    debug!(session = %session_id, "Outbox closed, stopping heartbeat");
                    break;
                }
                trace!(session = %session_id, "Sent liveness probe");
            }
        });

        Some(HeartbeatHandle { task })
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_record_echo_latency() {
        let state = LivenessState::new();
        assert_eq!(state.last_latency(), None);

        assert_eq!(state.record_echo(1_000, 1_042), 42);
        assert_eq!(state.last_latency(), Some(42));

        // A client clock ahead of ours yields zero rather than wrapping.
        assert_eq!(state.record_echo(2_000, 1_500), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_every_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = LivenessMonitor::new(Duration::from_millis(5_000), None);
        let _handle = monitor.start("s1".into(), tx, Arc::new(LivenessState::new()));

        time::sleep(Duration::from_millis(4_999)).await;
        assert!(rx.try_recv().is_err());

        time::sleep(Duration::from_millis(2)).await;
        match rx.recv().await {
            Some(Outbound::Event(event)) => {
                assert!(matches!(*event, ServerEvent::PingCheck(_)))
            }
            other => panic!("Expected probe, got {:?}", other),
        }

        time::sleep(Duration::from_millis(5_000)).await;
        assert!(matches!(rx.recv().await, Some(Outbound::Event(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_probes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = LivenessMonitor::new(Duration::from_millis(100), None);
        let handle = monitor
            .start("s1".into(), tx, Arc::new(LivenessState::new()))
            .unwrap();

        handle.cancel();
        time::sleep(Duration::from_millis(1_000)).await;

        // Aborting drops the task and with it the only sender.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_requests_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = LivenessMonitor::new(
            Duration::from_millis(1_000),
            Some(Duration::from_millis(2_500)),
        );
        let _handle = monitor.start("s1".into(), tx, Arc::new(LivenessState::new()));

        time::sleep(Duration::from_millis(3_500)).await;

        let mut saw_close = false;
        while let Some(outbound) = rx.recv().await {
            if matches!(outbound, Outbound::Close) {
                saw_close = true;
            }
        }
        assert!(saw_close);
    }

    #[test]
    fn test_zero_interval_disables() {
        let monitor = LivenessMonitor::new(Duration::ZERO, None);
        assert!(!monitor.is_enabled());
    }
}
