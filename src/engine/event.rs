// SPDX-License-Identifier: MIT

//! Run events and the reporting capability
//!
//! The scheduler and node state machine never log through ambient state;
//! they are handed a [`Reporter`] and publish [`RunEvent`]s to it.

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::drago::workflow::state::NodeState;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        mode: String,
        nodes: usize,
    },
    NodeTransition {
        run_id: Uuid,
        node: String,
        from: NodeState,
        to: NodeState,
        retry_count: u32,
    },
    /// A node will not run because a dependency did not succeed
    UpstreamFailed {
        run_id: Uuid,
        node: String,
        dependency: String,
    },
    AttemptFailed {
        run_id: Uuid,
        node: String,
        attempt: u32,
        error: String,
    },
    /// Single-step mode is waiting for a proceed signal
    AwaitingStep {
        run_id: Uuid,
        node: String,
        dependencies: Vec<String>,
    },
    RunCompleted {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
        elapsed_ms: u128,
    },
}

/// Sink for run events
pub trait Reporter: Send + Sync {
    fn report(&self, event: RunEvent);
}

/// Renders events through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: RunEvent) {
        match event {
            RunEvent::RunStarted {
                run_id,
                mode,
                nodes,
            } => log::info!("run={} started in {} mode with {} nodes", run_id, mode, nodes),
            RunEvent::NodeTransition {
                run_id,
                node,
                from,
                to,
                retry_count,
            } => log::info!(
                "run={} node={} {} -> {} (retries={})",
                run_id,
                node,
                from,
                to,
                retry_count
            ),
            RunEvent::UpstreamFailed {
                run_id,
                node,
                dependency,
            } => log::warn!(
                "run={} node={} skipped: dependency {} did not succeed",
                run_id,
                node,
                dependency
            ),
            RunEvent::AttemptFailed {
                run_id,
                node,
                attempt,
                error,
            } => log::warn!(
                "run={} node={} attempt {} failed: {}",
                run_id,
                node,
                attempt,
                error
            ),
            RunEvent::AwaitingStep {
                run_id,
                node,
                dependencies,
            } => log::info!(
                "run={} next node={} dependencies={:?}",
                run_id,
                node,
                dependencies
            ),
            RunEvent::RunCompleted {
                run_id,
                succeeded,
                failed,
                elapsed_ms,
            } => log::info!(
                "run={} completed in {}ms: {} succeeded, {} failed",
                run_id,
                elapsed_ms,
                succeeded,
                failed
            ),
        }
    }
}

/// Forwards events over an unbounded channel; dropped receivers are ignored
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}
