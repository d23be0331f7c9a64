// SPDX-License-Identifier: MIT

//! Node handler extension point
//!
//! A handler performs the actual work of a node attempt. The scheduler never
//! branches on node type; it looks the handler up in a registry and calls
//! [`NodeHandler::execute`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use super::error::ExecutionError;

/// Fixed execution parameters attached to a node type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutionParams {
    /// Time spent on a single attempt
    pub base_delay: Duration,
    /// Probability in `[0, 1]` that an attempt succeeds
    pub success_rate: f64,
    /// Retries allowed after the first failed attempt
    pub max_retries: u32,
    /// Backoff unit; the n-th retry waits `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl ExecutionParams {
    pub fn new(
        base_delay: Duration,
        success_rate: f64,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            base_delay,
            success_rate,
            max_retries,
            retry_backoff,
        }
    }

    /// Builder-style override of the success probability
    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate;
        self
    }

    /// Builder-style override of the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Everything a handler sees for one attempt
#[derive(Debug, Clone)]
pub struct NodeInput {
    pub node_id: String,
    pub node_type: String,
    /// 0 for the first attempt, n for the n-th retry
    pub attempt: u32,
    /// Values read from the key-value bus, keyed by input key
    pub inputs: Map<String, Value>,
    pub params: ExecutionParams,
}

/// Trait for the work performed by a node.
///
/// Returning `Ok(value)` marks the attempt successful; `value` is published
/// under the node's output key if it has one. Returning
/// [`ExecutionError::AttemptFailed`] lets the retry policy decide what
/// happens next. Any other error fails the node without retrying.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(&self, input: NodeInput) -> Result<Value, ExecutionError>;
}

/// Stand-in for real work: sleeps for the base delay, then succeeds with the
/// configured probability.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedHandler;

#[async_trait]
impl NodeHandler for SimulatedHandler {
    async fn execute(&self, input: NodeInput) -> Result<Value, ExecutionError> {
        log::debug!(
            "Executing node {} (attempt {}) with inputs {:?}",
            input.node_id,
            input.attempt,
            input.inputs
        );

        tokio::time::sleep(input.params.base_delay).await;

        let roll: f64 = rand::random();
        if roll < input.params.success_rate {
            Ok(Value::String(format!("result-{}", input.node_id)))
        } else {
            Err(ExecutionError::attempt_failed(
                input.node_id,
                format!(
                    "simulated failure (roll {:.3} >= {:.3})",
                    roll, input.params.success_rate
                ),
            ))
        }
    }
}
