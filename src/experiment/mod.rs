//! Program execution
//!
//! - `state`: run state and the shared cancellation token
//! - `interpreter`: the tree-walking evaluator
//! - `run_engine`: the run controller driving whole programs

pub mod interpreter;
pub mod run_engine;
pub mod state;

pub use interpreter::Interpreter;
pub use run_engine::{RunController, RunOutcome, RunReport};
pub use state::{RunState, RunTicket, RunToken, StopSignal};
