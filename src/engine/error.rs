// SPDX-License-Identifier: MIT

//! Typed error handling for drago-rs
//!
//! Errors are split by the phase in which they surface:
//! - `LoadError` - reading and decoding a workflow definition
//! - `ValidationError` - structural checks over a loaded graph
//! - `ExecutionError` - node attempts and scheduler bookkeeping

use std::path::PathBuf;
use thiserror::Error;

use crate::drago::workflow::state::NodeState;

/// Top-level error type for drago-rs
#[derive(Debug, Error)]
pub enum DragoError {
    /// Workflow file could not be read or decoded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Workflow graph failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A run could not be driven to completion
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Errors raised while loading a workflow definition
#[derive(Debug, Error)]
pub enum LoadError {
    /// The workflow file could not be read
    #[error("failed to read workflow file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input does not decode into the node schema
    #[error("malformed workflow definition: {0}")]
    MalformedDefinition(String),
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedDefinition(err.to_string())
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::MalformedDefinition(err.to_string())
    }
}

/// Structural problems found by the validator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A node depends on an id that is not part of the graph
    #[error("node {node} has missing dependency: {dependency}")]
    MissingDependency { node: String, dependency: String },

    /// A node declares a type outside the known set
    #[error("invalid node type {node_type} for node {node}")]
    InvalidNodeType { node: String, node_type: String },

    /// The dependency edges contain a cycle; `path` is a witness
    #[error("cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}

/// Errors raised while executing nodes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// A single attempt did not succeed; eligible for retry
    #[error("node {node} attempt failed: {reason}")]
    AttemptFailed { node: String, reason: String },

    /// The run was cancelled while the node was waiting or executing
    #[error("node {0} cancelled")]
    Cancelled(String),

    /// No handler is registered for the node's type
    #[error("no handler registered for node type {0}")]
    HandlerMissing(String),

    /// A state change not permitted by the node lifecycle
    #[error("node {node} cannot move from {from} to {to}")]
    InvalidTransition {
        node: String,
        from: NodeState,
        to: NodeState,
    },

    /// The node id is not part of the graph
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Topological ordering could not place every node
    #[error("graph cannot be scheduled, unplaced nodes: {0:?}")]
    Unschedulable(Vec<String>),
}

impl ExecutionError {
    /// Create an attempt failure
    pub fn attempt_failed(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AttemptFailed {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Whether the retry policy may schedule another attempt after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AttemptFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_message() {
        let err = ValidationError::MissingDependency {
            node: "process".to_string(),
            dependency: "non-existent-node".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "node process has missing dependency: non-existent-node"
        );
    }

    #[test]
    fn test_cycle_message_names_witness() {
        let err = ValidationError::CycleDetected {
            path: vec!["a".into(), "c".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cycle detected: a -> c -> b -> a");
    }

    #[test]
    fn test_only_attempt_failures_are_retryable() {
        assert!(ExecutionError::attempt_failed("n", "boom").is_retryable());
        assert!(!ExecutionError::Cancelled("n".into()).is_retryable());
        assert!(!ExecutionError::HandlerMissing("api".into()).is_retryable());
    }

    #[test]
    fn test_load_error_from_json() {
        let err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let load: LoadError = err.into();
        assert!(matches!(load, LoadError::MalformedDefinition(_)));

        let top: DragoError = load.into();
        assert!(top.to_string().starts_with("malformed workflow definition"));
    }
}
