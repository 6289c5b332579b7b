//! Tree-walking interpreter for block programs.
//!
//! The interpreter walks one chain at a time, depth first. Before each node,
//! and before each loop iteration, it consults the run ticket; once a stop is
//! pending only `Stop` nodes still execute. Waits and settle delays already in
//! progress always run to completion.
//!
//! A node that cannot be interpreted (missing field, bad literal, value out of
//! range) is reported on the event log and skipped; its siblings still run.

use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::NodeError;
use crate::experiment::state::RunTicket;
use crate::hardware::{Action, CommandChannel};
use crate::log_capture::EventLog;
use crate::program::fields;
use crate::program::node::{NodeKind, ProgramNode};

/// Dispatch `action` and report an unreachable device on the event log.
pub async fn dispatch_logged(
    channel: &dyn CommandChannel,
    events: &EventLog,
    action: Action,
    value: Option<u16>,
) -> bool {
    let reachable = channel.dispatch(action, value).await;
    if !reachable {
        events.error(format!("Robot unreachable, '{action}' not sent"));
    }
    reachable
}

/// Evaluator for one run.
///
/// Execution methods return the number of nodes that failed to interpret,
/// loop bodies included.
pub struct Interpreter<'a> {
    channel: &'a dyn CommandChannel,
    events: &'a EventLog,
    ticket: &'a RunTicket<'a>,
    pacing_delay: Duration,
}

impl<'a> Interpreter<'a> {
    /// Interpreter dispatching through `channel` on behalf of `ticket`'s run.
    pub fn new(
        channel: &'a dyn CommandChannel,
        events: &'a EventLog,
        ticket: &'a RunTicket<'a>,
        pacing_delay: Duration,
    ) -> Self {
        Self {
            channel,
            events,
            ticket,
            pacing_delay,
        }
    }

    /// Execute `first` and every node after it, until the chain ends or a
    /// stop is pending.
    pub async fn execute_chain(&self, first: &ProgramNode) -> usize {
        let mut errors = 0;
        for node in first.iter_chain() {
            if self.ticket.is_stopping() {
                break;
            }
            errors += self.execute(node).await;
        }
        errors
    }

    /// Execute a single node, followed by the pacing delay.
    pub fn execute<'s>(&'s self, node: &'s ProgramNode) -> BoxFuture<'s, usize> {
        async move {
            if self.ticket.is_stopping() && node.kind != NodeKind::Stop {
                debug!(kind = node.kind.name(), "Skipping node, stop pending");
                return 0;
            }

            match self.step(node).await {
                Ok(nested_errors) => {
                    sleep(self.pacing_delay).await;
                    nested_errors
                }
                Err(e) => {
                    warn!(kind = node.kind.name(), error = %e, "Node failed");
                    self.events.error(e.to_string());
                    1
                }
            }
        }
        .boxed()
    }

    /// Run `node`'s action; `Ok` carries the error count of a loop body.
    async fn step(&self, node: &ProgramNode) -> Result<usize, NodeError> {
        let kind = node.kind.name();
        match &node.kind {
            NodeKind::Move { direction } => {
                let direction = fields::direction(kind, direction.as_ref())?;
                self.events.info(format!("Move {direction}"));
                self.send(Action::from(direction), None).await;
            }
            NodeKind::Stop => {
                self.events.info("Stop");
                self.send(Action::Stop, None).await;
            }
            NodeKind::Wait { seconds } => {
                let duration = fields::wait_duration(kind, seconds.as_ref())?;
                self.events
                    .info(format!("Wait {}s", duration.as_secs_f64()));
                sleep(duration).await;
            }
            NodeKind::SetSpeed { speed } => {
                let speed = fields::speed(kind, speed.as_ref())?;
                self.events.info(format!("Speed {speed}"));
                self.send(Action::Speed, Some(speed)).await;
            }
            NodeKind::RepeatFixed { times, body } => {
                let count = fields::repeat_count(kind, times.as_ref(), None)?;
                return Ok(self.repeat(count, body.as_deref()).await);
            }
            NodeKind::RepeatCounted { times, body } => {
                let count = fields::repeat_count(kind, times.as_ref(), Some(1))?;
                return Ok(self.repeat(count, body.as_deref()).await);
            }
            NodeKind::Print { message } => {
                let message = fields::message(kind, message.as_ref())?;
                self.events.info(message);
            }
            NodeKind::Unsupported { type_name, .. } => {
                return Err(NodeError::Unsupported {
                    type_name: type_name.clone(),
                });
            }
        }
        Ok(0)
    }

    async fn repeat(&self, count: u32, body: Option<&ProgramNode>) -> usize {
        self.events.info(format!("Repeat {count}x"));
        let Some(body) = body else {
            return 0;
        };
        let mut errors = 0;
        for iteration in 0..count {
            if self.ticket.is_stopping() {
                debug!(iteration, count, "Loop interrupted");
                break;
            }
            errors += self.execute_chain(body).await;
        }
        errors
    }

    async fn send(&self, action: Action, value: Option<u16>) -> bool {
        dispatch_logged(self.channel, self.events, action, value).await
    }
}
