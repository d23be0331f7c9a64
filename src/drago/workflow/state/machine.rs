// SPDX-License-Identifier: MIT

//! Node lifecycle and retry policy
//!
//! ```text
//! Pending -> Running -> Success
//!              |  ^
//!              v  |
//!            Retrying
//!              |
//!              v
//!            Failed
//! ```
//!
//! `Pending -> Failed` covers nodes that never run because an upstream node
//! failed or the run was cancelled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::drago::workflow::run::RunContext;
use crate::engine::error::ExecutionError;
use crate::engine::event::RunEvent;
use crate::engine::handler::{ExecutionParams, NodeInput};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Pending => "pending",
            NodeState::Running => "running",
            NodeState::Success => "success",
            NodeState::Failed => "failed",
            NodeState::Retrying => "retrying",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Success | NodeState::Failed)
    }

    pub fn can_transition_to(&self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Success)
                | (Running, Retrying)
                | (Running, Failed)
                | (Retrying, Running)
                | (Retrying, Failed)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear backoff bounded by a retry budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Wait before the attempt numbered `retry_count` (1-based)
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        self.backoff.saturating_mul(retry_count)
    }
}

impl From<&ExecutionParams> for RetryPolicy {
    fn from(params: &ExecutionParams) -> Self {
        Self {
            max_retries: params.max_retries,
            backoff: params.retry_backoff,
        }
    }
}

/// Drive one node to a terminal state and return it.
///
/// Errors that are not attempt failures (cancellation, missing handler,
/// lifecycle violations) fail the node without consuming retries.
pub async fn run_node(ctx: &RunContext, node_id: &str) -> NodeState {
    match drive(ctx, node_id).await {
        Ok(state) => state,
        Err(ExecutionError::Cancelled(_)) => {
            log::warn!("run={} node={} cancelled", ctx.run_id, node_id);
            ctx.fail(node_id).await
        }
        Err(e) => {
            log::error!("run={} node={} aborted: {}", ctx.run_id, node_id, e);
            ctx.fail(node_id).await
        }
    }
}

async fn drive(ctx: &RunContext, node_id: &str) -> Result<NodeState, ExecutionError> {
    let node = ctx
        .graph
        .node(node_id)
        .await
        .ok_or_else(|| ExecutionError::UnknownNode(node_id.to_string()))?;
    let kind = node
        .kind()
        .ok_or_else(|| ExecutionError::HandlerMissing(node.node_type.clone()))?;
    let registration = ctx
        .registry
        .get(kind)
        .await
        .ok_or_else(|| ExecutionError::HandlerMissing(node.node_type.clone()))?;
    let policy = RetryPolicy::from(&registration.params);

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled(node_id.to_string()));
        }

        let attempt = ctx.transition(node_id, NodeState::Running).await?;
        let input = NodeInput {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            attempt: attempt.retry_count,
            inputs: ctx.bus.get_many(&node.input_keys).await,
            params: registration.params,
        };

        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => Err(ExecutionError::Cancelled(node_id.to_string())),
            result = registration.handler.execute(input) => result,
        };

        match outcome {
            Ok(value) => {
                // published before Success so dependents always see it
                if let Some(key) = &node.output_key {
                    ctx.bus.set(key.clone(), value).await;
                }
                ctx.transition(node_id, NodeState::Success).await?;
                return Ok(NodeState::Success);
            }
            Err(e) if e.is_retryable() => {
                ctx.reporter.report(RunEvent::AttemptFailed {
                    run_id: ctx.run_id,
                    node: node_id.to_string(),
                    attempt: attempt.retry_count,
                    error: e.to_string(),
                });

                if !policy.allows_retry(attempt.retry_count) {
                    ctx.transition(node_id, NodeState::Failed).await?;
                    return Ok(NodeState::Failed);
                }

                let retry = ctx.retry(node_id).await?;
                let wait = policy.backoff_for(retry.retry_count);
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {
                        return Err(ExecutionError::Cancelled(node_id.to_string()));
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}
