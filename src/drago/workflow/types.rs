// SPDX-License-Identifier: MIT

//! Schema types for workflow definition files
//!
//! A workflow file is either a bare list of node specifications or an object
//! with a `name` and a `nodes` list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::handler::ExecutionParams;

/// A node as written in a workflow definition
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NodeSpec {
    /// Unique node identifier
    pub id: String,
    /// Node type name; checked by the validator, not the decoder
    #[serde(rename = "type")]
    pub node_type: String,
    /// Nodes that must succeed before this one starts
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Key-value bus keys read before execution, in order
    #[serde(default)]
    pub input_keys: Vec<String>,
    /// Key-value bus key written on success
    #[serde(default)]
    pub output_key: Option<String>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            dependencies: Vec::new(),
            input_keys: Vec::new(),
            output_key: None,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn reads<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn writes(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }
}

/// Top-level layout of a workflow file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WorkflowFile {
    /// A bare array of nodes
    Nodes(Vec<NodeSpec>),
    /// A named workflow
    Named {
        #[serde(default)]
        name: String,
        nodes: Vec<NodeSpec>,
    },
}

impl WorkflowFile {
    pub fn name(&self) -> Option<&str> {
        match self {
            WorkflowFile::Nodes(_) => None,
            WorkflowFile::Named { name, .. } if !name.is_empty() => Some(name),
            WorkflowFile::Named { .. } => None,
        }
    }

    pub fn into_nodes(self) -> Vec<NodeSpec> {
        match self {
            WorkflowFile::Nodes(nodes) => nodes,
            WorkflowFile::Named { nodes, .. } => nodes,
        }
    }
}

/// The closed set of node types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Trigger,
    Compute,
    Decision,
    Api,
    Action,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Trigger,
        NodeKind::Compute,
        NodeKind::Decision,
        NodeKind::Api,
        NodeKind::Action,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Compute => "compute",
            NodeKind::Decision => "decision",
            NodeKind::Api => "api",
            NodeKind::Action => "action",
        }
    }

    /// Static execution parameters for this type
    pub fn default_params(&self) -> ExecutionParams {
        match self {
            NodeKind::Trigger => ExecutionParams::new(
                Duration::from_millis(200),
                1.0,
                3,
                Duration::from_secs(1),
            ),
            NodeKind::Compute => ExecutionParams::new(
                Duration::from_millis(500),
                0.8,
                3,
                Duration::from_secs(1),
            ),
            NodeKind::Decision => ExecutionParams::new(
                Duration::from_millis(100),
                1.0,
                1,
                Duration::from_millis(500),
            ),
            NodeKind::Api => ExecutionParams::new(
                Duration::from_millis(300),
                0.6,
                3,
                Duration::from_secs(2),
            ),
            NodeKind::Action => ExecutionParams::new(
                Duration::from_millis(100),
                1.0,
                3,
                Duration::from_secs(1),
            ),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown node type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_spec_defaults() {
        let json = r#"{"id": "start", "type": "trigger"}"#;
        let spec: NodeSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.id, "start");
        assert_eq!(spec.node_type, "trigger");
        assert!(spec.dependencies.is_empty());
        assert!(spec.input_keys.is_empty());
        assert!(spec.output_key.is_none());
    }

    #[test]
    fn test_node_spec_full() {
        let json = r#"{
            "id": "process",
            "type": "compute",
            "dependencies": ["start"],
            "input_keys": ["payload", "user"],
            "output_key": "processed"
        }"#;
        let spec: NodeSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.dependencies, vec!["start"]);
        assert_eq!(spec.input_keys, vec!["payload", "user"]);
        assert_eq!(spec.output_key.as_deref(), Some("processed"));
    }

    #[test]
    fn test_unknown_type_still_decodes() {
        let json = r#"{"id": "x", "type": "teleport"}"#;
        let spec: NodeSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.node_type, "teleport");
        assert!(spec.node_type.parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let json = r#"{"type": "trigger"}"#;
        assert!(serde_json::from_str::<NodeSpec>(json).is_err());
    }

    #[test]
    fn test_workflow_file_bare_list() {
        let json = r#"[{"id": "a", "type": "trigger"}]"#;
        let file: WorkflowFile = serde_json::from_str(json).unwrap();
        assert!(file.name().is_none());
        assert_eq!(file.into_nodes().len(), 1);
    }

    #[test]
    fn test_workflow_file_named() {
        let yaml = r#"
name: nightly
nodes:
  - id: a
    type: trigger
  - id: b
    type: action
    dependencies: [a]
"#;
        let file: WorkflowFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.name(), Some("nightly"));
        let nodes = file.into_nodes();
        assert_eq!(nodes[1].dependencies, vec!["a"]);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_default_params_table() {
        let compute = NodeKind::Compute.default_params();
        assert_eq!(compute.max_retries, 3);
        assert_eq!(compute.base_delay, Duration::from_millis(500));
        assert_eq!(NodeKind::Decision.default_params().max_retries, 1);
        assert_eq!(NodeKind::Trigger.default_params().success_rate, 1.0);
    }

    #[test]
    fn test_spec_builder() {
        let spec = NodeSpec::new("b", "compute")
            .depends_on(["a"])
            .reads(["k"])
            .writes("out");
        assert_eq!(spec.dependencies, vec!["a"]);
        assert_eq!(spec.input_keys, vec!["k"]);
        assert_eq!(spec.output_key.as_deref(), Some("out"));
    }
}
