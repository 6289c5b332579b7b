//! Device communication
//!
//! - `capabilities`: the `CommandChannel` trait and wire vocabulary
//! - `http`: the real fire-and-forget HTTP channel
//! - `mock`: a recording channel for tests and dry runs

pub mod capabilities;
pub mod http;
pub mod mock;

pub use capabilities::{Action, CommandChannel, Direction, MAX_SPEED};
pub use http::HttpCommandChannel;
pub use mock::RecordingChannel;
