//! Event log for user-facing run output.
//!
//! Every line the user should see while a program runs (start, each executed
//! block, node errors, stops) is an [`Event`] with a [`Severity`]. The log keeps a
//! bounded buffer for late readers, broadcasts each event to live subscribers
//! (the CLI renderer) and mirrors it into `tracing`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const BROADCAST_CAPACITY: usize = 256;

/// Severity of a user-facing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Progress, e.g. a dispatched command.
    Info,
    /// A run or connection test finished.
    Success,
    /// A stop was requested.
    Warning,
    /// A node failed or the robot did not answer.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Local time the event was recorded.
    pub timestamp: DateTime<Local>,
    /// Event severity.
    pub severity: Severity,
    /// Human-readable text.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.message
        )
    }
}

struct Inner {
    buffer: Mutex<VecDeque<Event>>,
    capacity: usize,
    sender: broadcast::Sender<Event>,
}

/// A thread-safe, fixed-capacity event log. Clones share the same buffer.
#[derive(Clone)]
pub struct EventLog(Arc<Inner>);

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventLog {
    /// Create a log retaining at most `capacity` events (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self(Arc::new(Inner {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sender,
        }))
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.0.sender.subscribe()
    }

    /// Record an event.
    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => info!(target: "botblocks::events", %severity, "{}", message),
            Severity::Warning => warn!(target: "botblocks::events", "{}", message),
            Severity::Error => error!(target: "botblocks::events", "{}", message),
        }

        let event = Event {
            timestamp: Local::now(),
            severity,
            message,
        };

        {
            let mut buffer = self.lock();
            if buffer.len() >= self.0.capacity {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }

        // No subscribers is fine.
        let _ = self.0.sender.send(event);
    }

    /// Record a [`Severity::Info`] event.
    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    /// Record a [`Severity::Success`] event.
    pub fn success(&self, message: impl Into<String>) {
        self.emit(Severity::Success, message);
    }

    /// Record a [`Severity::Warning`] event.
    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message);
    }

    /// Record a [`Severity::Error`] event.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }

    /// Copy of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained events with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|e| e.severity == severity).count()
    }

    /// Drop all retained events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        // A panic while holding the lock leaves the deque intact.
        self.0
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
