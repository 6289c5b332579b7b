//! # botblocks
//!
//! Runs block programs (move, stop, wait, set speed, repeat, print) against a
//! Wi-Fi robot that accepts commands over plain HTTP. Commands are
//! fire-and-forget: the device never acknowledges them, so the interpreter
//! paces itself with fixed settle and pacing delays.
//!
//! ## Crate Structure
//!
//! - **`config`**: layered `figment` configuration (`BotConfig`).
//! - **`error`**: `BotError` for the library API and `NodeError` for per-block
//!   failures during a run.
//! - **`experiment`**: the run controller, interpreter and cancellation token.
//! - **`hardware`**: the `CommandChannel` trait, the HTTP channel and a
//!   recording channel for tests.
//! - **`log_capture`**: the user-facing event log.
//! - **`program`**: the program tree model, example programs and slot storage.
//! - **`tracing_setup`**: `tracing-subscriber` initialisation.

pub mod config;
pub mod error;
pub mod experiment;
pub mod hardware;
pub mod log_capture;
pub mod program;
pub mod tracing_setup;

pub use config::BotConfig;
pub use error::{AppResult, BotError, NodeError};
pub use experiment::{RunController, RunOutcome, RunReport, RunState};
pub use log_capture::{Event, EventLog, Severity};
pub use program::{Program, ProgramNode};
