//! Command channel capability
//!
//! The robot exposes a single capability: accept a motion command. There is no
//! feedback path, so a channel can only say whether it managed to *issue* a
//! request, never whether the device acted on it.
//!
//! # Contract
//!
//! - `dispatch` issues the command without waiting for a response body
//! - after issuing, it always waits the settle delay before returning, which
//!   throttles the command rate and gives the device time to begin acting
//! - it returns `true` once the request is issued and `false` only when the
//!   request could not even be built (e.g. a malformed device address)
//! - every call updates the connectivity indicator
//!
//! The interpreter only ever talks to `dyn CommandChannel`, which keeps it testable
//! with [`crate::hardware::mock::RecordingChannel`] instead of a real network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

/// Largest value accepted by the `speed` action.
pub const MAX_SPEED: u16 = 1023;

/// Direction of a move block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Drive forward.
    Forward,
    /// Drive backward.
    Backward,
    /// Turn left.
    Left,
    /// Turn right.
    Right,
}

impl Direction {
    /// Lowercase name, as written in programs and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Action understood by the device's `/cmd` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Drive forward until the next command.
    Forward,
    /// Drive backward until the next command.
    Backward,
    /// Turn left until the next command.
    Left,
    /// Turn right until the next command.
    Right,
    /// Halt the motors.
    Stop,
    /// Set motor speed; carries a value in `0..=MAX_SPEED`.
    Speed,
}

impl Action {
    /// Wire name used in the `action` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::Left => "left",
            Action::Right => "right",
            Action::Stop => "stop",
            Action::Speed => "speed",
        }
    }
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Action::Forward,
            Direction::Backward => Action::Backward,
            Direction::Left => Action::Left,
            Direction::Right => Action::Right,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability: fire-and-forget command dispatch
///
/// Implementations must be cheap to share (`Arc<dyn CommandChannel>`) and use
/// interior mutability for the device address and connectivity state.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Issue `action` (with `value` for [`Action::Speed`]) and wait the settle delay.
    ///
    /// # Returns
    /// - `true` if the request was issued (delivery is never confirmed)
    /// - `false` if the request could not be constructed
    async fn dispatch(&self, action: Action, value: Option<u16>) -> bool;

    /// Point the channel at a different device.
    async fn set_address(&self, address: &str);

    /// Current device address.
    async fn address(&self) -> String;

    /// Watch the connectivity indicator (`true` = last dispatch was issued).
    fn subscribe_connectivity(&self) -> watch::Receiver<bool>;

    /// Current value of the connectivity indicator.
    fn is_connected(&self) -> bool {
        *self.subscribe_connectivity().borrow()
    }
}
