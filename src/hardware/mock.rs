//! Mock Hardware Implementations
//!
//! Provides a simulated command channel for testing without a robot.
//! The mock uses async-safe timing (`tokio::time::sleep`), so tests running on a
//! paused clock observe exact settle delays.
//!
//! # Example
//!
//! ```rust,ignore
//! let channel = RecordingChannel::new();
//! channel.dispatch(Action::Forward, None).await;
//! assert_eq!(channel.actions(), vec![Action::Forward]);
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{sleep, Instant};

use crate::hardware::capabilities::{Action, CommandChannel};

/// One dispatch seen by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Dispatched action
    pub action: Action,
    /// Optional value, only sent with [`Action::Speed`]
    pub value: Option<u16>,
    /// When the dispatch was issued (tokio clock, so paused-time aware)
    pub at: Instant,
}

/// Command channel that records every dispatch instead of sending it.
///
/// - Settle delay defaults to the real 50ms
/// - `set_reachable(false)` makes dispatches fail like a malformed address would
pub struct RecordingChannel {
    records: Mutex<Vec<DispatchRecord>>,
    address: RwLock<String>,
    settle_delay: Duration,
    reachable: AtomicBool,
    connected: watch::Sender<bool>,
}

impl RecordingChannel {
    /// Create a recording channel with the standard 50ms settle delay
    pub fn new() -> Self {
        Self::with_settle_delay(Duration::from_millis(50))
    }

    /// Create a recording channel with a custom settle delay
    pub fn with_settle_delay(settle_delay: Duration) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            records: Mutex::new(Vec::new()),
            address: RwLock::new("http://mock.invalid".to_string()),
            settle_delay,
            reachable: AtomicBool::new(true),
            connected,
        }
    }

    /// Make subsequent dispatches succeed or fail
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Every recorded dispatch, in order
    pub fn records(&self) -> Vec<DispatchRecord> {
        self.lock().clone()
    }

    /// Recorded actions, in order
    pub fn actions(&self) -> Vec<Action> {
        self.lock().iter().map(|r| r.action).collect()
    }

    /// Number of dispatches of `action`
    pub fn count(&self, action: Action) -> usize {
        self.lock().iter().filter(|r| r.action == action).count()
    }

    /// Forget all recorded dispatches
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DispatchRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandChannel for RecordingChannel {
    async fn dispatch(&self, action: Action, value: Option<u16>) -> bool {
        if !self.reachable.load(Ordering::SeqCst) {
            self.connected.send_replace(false);
            return false;
        }

        self.lock().push(DispatchRecord {
            action,
            value,
            at: Instant::now(),
        });
        self.connected.send_replace(true);

        sleep(self.settle_delay).await;
        true
    }

    async fn set_address(&self, address: &str) {
        *self.address.write().await = address.to_string();
    }

    async fn address(&self) -> String {
        self.address.read().await.clone()
    }

    fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn records_dispatches_and_waits_settle_delay() {
        let channel = RecordingChannel::new();
        let start = Instant::now();

        assert!(channel.dispatch(Action::Speed, Some(512)).await);
        assert!(channel.dispatch(Action::Stop, None).await);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(110));
        assert_eq!(channel.actions(), vec![Action::Speed, Action::Stop]);
        assert_eq!(channel.records()[0].value, Some(512));
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn unreachable_channel_records_nothing() {
        let channel = RecordingChannel::with_settle_delay(Duration::ZERO);
        channel.set_reachable(false);

        assert!(!channel.dispatch(Action::Forward, None).await);
        assert!(channel.records().is_empty());
        assert!(!channel.is_connected());
    }
}
