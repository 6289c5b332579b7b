//! Run state and cancellation.
//!
//! [`RunToken`] is shared between the run controller, the interpreter and the
//! outside controls (stop buttons, Ctrl+C). It holds two pieces of state:
//!
//! - [`RunState`]: whether a program is currently running
//! - [`StopSignal`]: whether a stop has been requested, and how urgently
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  begin()   ┌─────────┐
//! │ Idle │───────────▶│ Running │
//! └──────┘            └────┬────┘
//!    ▲                     │
//!    │  ticket.finish()    │
//!    │  request_emergency_stop()
//!    └─────────────────────┘
//! ```
//!
//! A cooperative stop only raises the signal; the run notices it at the next
//! checkpoint and finishes normally. An emergency stop also forces `Idle`
//! immediately, so a new run may begin while the old one is still suspended
//! in a wait. Every run therefore holds a [`RunTicket`] tagged with a
//! generation number: once a newer run has begun, the old ticket reports
//! "stopping" forever and releasing it leaves the state alone.
//!
//! A ticket is released by `finish()` or, if the run is cancelled mid-way,
//! when it is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use tokio::sync::broadcast;

/// Whether a program is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No program is running.
    Idle,
    /// A program is being interpreted.
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
        }
    }
}

/// Pending stop request, ordered by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StopSignal {
    /// No stop requested.
    None,
    /// Halt at the next checkpoint.
    Cooperative,
    /// Halt at the next checkpoint; state already forced to `Idle`.
    Emergency,
}

impl StopSignal {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StopSignal::None,
            1 => StopSignal::Cooperative,
            _ => StopSignal::Emergency,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            StopSignal::None => 0,
            StopSignal::Cooperative => 1,
            StopSignal::Emergency => 2,
        }
    }
}

/// Shared run/stop state.
pub struct RunToken {
    running: AtomicBool,
    signal: AtomicU8,
    generation: AtomicU64,
    transitions: broadcast::Sender<RunState>,
}

impl Default for RunToken {
    fn default() -> Self {
        Self::new()
    }
}

impl RunToken {
    /// An idle token with no stop pending.
    pub fn new() -> Self {
        let (transitions, _) = broadcast::channel(64);
        Self {
            running: AtomicBool::new(false),
            signal: AtomicU8::new(StopSignal::None.as_u8()),
            generation: AtomicU64::new(0),
            transitions,
        }
    }

    /// Claim the token for a new run.
    ///
    /// Returns `None` if a run is already in progress. Otherwise the state
    /// becomes `Running`, the stop signal is cleared and any older ticket is
    /// invalidated.
    pub fn begin(&self) -> Option<RunTicket<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.reset();
        self.notify(RunState::Running);
        Some(RunTicket {
            token: self,
            generation,
            released: false,
        })
    }

    /// Raise a cooperative stop. Does not change the run state.
    pub fn request_stop(&self) {
        self.raise(StopSignal::Cooperative);
    }

    /// Raise an emergency stop and force the state to `Idle`.
    pub fn request_emergency_stop(&self) {
        self.raise(StopSignal::Emergency);
        self.force_idle();
    }

    /// True while any stop is pending.
    pub fn is_stopping(&self) -> bool {
        self.signal() != StopSignal::None
    }

    /// The pending stop request.
    pub fn signal(&self) -> StopSignal {
        StopSignal::from_u8(self.signal.load(Ordering::SeqCst))
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::SeqCst) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunState> {
        self.transitions.subscribe()
    }

    fn reset(&self) {
        self.signal
            .store(StopSignal::None.as_u8(), Ordering::SeqCst);
    }

    fn raise(&self, signal: StopSignal) {
        // Never downgrade an emergency to a cooperative stop.
        self.signal.fetch_max(signal.as_u8(), Ordering::SeqCst);
    }

    fn force_idle(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if was_running {
            self.notify(RunState::Idle);
        }
        was_running
    }

    fn notify(&self, state: RunState) {
        let _ = self.transitions.send(state);
    }
}

/// One run's handle onto the [`RunToken`].
///
/// Dropping an unfinished ticket releases it like [`RunTicket::finish`].
pub struct RunTicket<'a> {
    token: &'a RunToken,
    generation: u64,
    released: bool,
}

impl RunTicket<'_> {
    /// True once a stop was requested or a newer run has begun.
    pub fn is_stopping(&self) -> bool {
        self.is_superseded() || self.token.is_stopping()
    }

    /// True once a newer run has begun.
    pub fn is_superseded(&self) -> bool {
        self.token.generation.load(Ordering::SeqCst) != self.generation
    }

    /// This run's generation number; later runs have larger numbers.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Move the state to `Idle` if this run still owns it.
    ///
    /// Returns whether this call made the transition.
    pub fn finish(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        if std::mem::replace(&mut self.released, true) || self.is_superseded() {
            return false;
        }
        self.token.force_idle()
    }
}

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
