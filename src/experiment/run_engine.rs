//! Run controller.
//!
//! Orchestrates a full program run: claims the [`RunToken`], walks every
//! top-level sequence through the [`Interpreter`], sends the closing `stop`
//! command on natural completion and returns the token to `Idle`.
//!
//! `stop()` and `emergency_stop()` may be called from other tasks while a run
//! is in progress; they only raise flags and send a `stop` command.
//!
//! # Usage
//!
//! ```rust,ignore
//! let controller = Arc::new(RunController::new(channel, EventLog::default(), pacing));
//!
//! let runner = {
//!     let controller = controller.clone();
//!     tokio::spawn(async move { controller.run(&program).await })
//! };
//! controller.stop().await;
//! let report = runner.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::BotConfig;
use crate::experiment::interpreter::{dispatch_logged, Interpreter};
use crate::experiment::state::{RunState, RunToken};
use crate::hardware::{Action, CommandChannel};
use crate::log_capture::EventLog;
use crate::program::node::Program;

/// Pause between the moves of a connection test.
const TEST_MOVE_DELAY: Duration = Duration::from_millis(400);

/// How a call to [`RunController::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every sequence ran to the end.
    Completed,
    /// A stop or emergency stop cut the run short.
    Stopped,
    /// Another run was in progress; nothing happened.
    AlreadyRunning,
}

/// Summary of one call to [`RunController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Unique run identifier (None if the run never started)
    pub run_id: Option<Uuid>,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Nodes that could not be interpreted
    pub node_errors: usize,
}

/// Runs programs on one robot and exposes its stop controls.
///
/// Share it as `Arc<RunController>` to stop a run from another task.
pub struct RunController {
    channel: Arc<dyn CommandChannel>,
    token: RunToken,
    events: EventLog,
    pacing_delay: Duration,
}

impl RunController {
    /// Controller sending through `channel` and reporting to `events`.
    pub fn new(channel: Arc<dyn CommandChannel>, events: EventLog, pacing_delay: Duration) -> Self {
        Self {
            channel,
            token: RunToken::new(),
            events,
            pacing_delay,
        }
    }

    /// Create a controller with pacing and event buffer size from `config`.
    pub fn from_config(channel: Arc<dyn CommandChannel>, config: &BotConfig) -> Self {
        Self::new(
            channel,
            EventLog::new(config.interpreter.event_buffer),
            config.interpreter.pacing_delay(),
        )
    }

    /// Run `program` to completion or until stopped.
    ///
    /// Returns immediately with [`RunOutcome::AlreadyRunning`] if a run is in
    /// progress.
    pub async fn run(&self, program: &Program) -> RunReport {
        let Some(ticket) = self.token.begin() else {
            debug!("Run requested while a program is running; ignored");
            return RunReport {
                run_id: None,
                outcome: RunOutcome::AlreadyRunning,
                node_errors: 0,
            };
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, generation = ticket.generation());

        async move {
            self.events.clear();
            self.events.success("Starting...");
            info!(
                sequences = program.sequences().len(),
                nodes = program.node_count(),
                "Run started"
            );

            let interpreter =
                Interpreter::new(self.channel.as_ref(), &self.events, &ticket, self.pacing_delay);
            let mut node_errors = 0;
            for sequence in program.sequences() {
                if ticket.is_stopping() {
                    break;
                }
                node_errors += interpreter.execute_chain(sequence).await;
            }

            let outcome = if ticket.is_stopping() {
                RunOutcome::Stopped
            } else {
                self.events.success("Complete!");
                self.send(Action::Stop).await;
                RunOutcome::Completed
            };

            ticket.finish();
            info!(?outcome, node_errors, "Run finished");

            RunReport {
                run_id: Some(run_id),
                outcome,
                node_errors,
            }
        }
        .instrument(span)
        .await
    }

    /// Request a cooperative stop and tell the robot to stop now.
    ///
    /// The run finishes after its current wait or dispatch.
    pub async fn stop(&self) {
        self.token.request_stop();
        self.send(Action::Stop).await;
        self.events.warning("Stopped");
    }

    /// Stop immediately: the state is `Idle` before this returns.
    pub async fn emergency_stop(&self) {
        self.token.request_emergency_stop();
        self.send(Action::Stop).await;
        self.events.error("EMERGENCY STOP!");
    }

    /// Drive forward, then backward, then stop, so the user can watch the
    /// robot respond.
    ///
    /// Refused while a program is running. Returns whether every command was
    /// handed to the device.
    pub async fn test_connection(&self) -> bool {
        if self.is_running() {
            self.events
                .warning("Cannot test the connection while a program is running");
            return false;
        }

        self.events.info("Testing connection...");
        let mut reachable = self.send(Action::Forward).await;
        sleep(TEST_MOVE_DELAY).await;
        reachable &= self.send(Action::Backward).await;
        sleep(TEST_MOVE_DELAY).await;
        reachable &= self.send(Action::Stop).await;

        if reachable {
            self.events
                .success("Test commands sent. If the robot moved, it works!");
        }
        reachable
    }

    /// Point the channel at a different robot.
    pub async fn set_device_address(&self, address: &str) {
        self.channel.set_address(address).await;
        self.events.info(format!("Robot address set to {}", address.trim()));
    }

    /// Current robot address.
    pub async fn device_address(&self) -> String {
        self.channel.address().await
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.token.state()
    }

    /// True while a program is running.
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Whether the last command was handed to the robot.
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// The user-facing event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The shared run/stop state.
    pub fn token(&self) -> &RunToken {
        &self.token
    }

    /// Receive run state transitions.
    pub fn subscribe_state(&self) -> broadcast::Receiver<RunState> {
        self.token.subscribe()
    }

    async fn send(&self, action: Action) -> bool {
        dispatch_logged(self.channel.as_ref(), &self.events, action, None).await
    }
}
