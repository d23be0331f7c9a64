//! Graph model: nodes and forward adjacency
//!
//! The graph owns every node. All access goes through one async read-write
//! lock; state changes hold the write side only for the mutation itself.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::drago::workflow::state::NodeState;
use crate::drago::workflow::types::{NodeKind, NodeSpec};
use crate::engine::error::{ExecutionError, LoadError};

/// A node and its runtime lifecycle fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub node_type: String,
    pub dependencies: Vec<String>,
    pub input_keys: Vec<String>,
    pub output_key: Option<String>,
    pub state: NodeState,
    pub retry_count: u32,
}

impl Node {
    /// The node's type, if it names a known kind
    pub fn kind(&self) -> Option<NodeKind> {
        self.node_type.parse().ok()
    }
}

impl From<NodeSpec> for Node {
    fn from(spec: NodeSpec) -> Self {
        Self {
            id: spec.id,
            node_type: spec.node_type,
            dependencies: spec.dependencies,
            input_keys: spec.input_keys,
            output_key: spec.output_key,
            state: NodeState::Pending,
            retry_count: 0,
        }
    }
}

/// Result of a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: NodeState,
    pub to: NodeState,
    pub retry_count: u32,
}

#[derive(Debug, Default)]
pub(crate) struct GraphInner {
    pub(crate) nodes: HashMap<String, Node>,
    /// dependency id -> ids of nodes that depend on it
    pub(crate) edges: HashMap<String, Vec<String>>,
}

impl GraphInner {
    fn insert(&mut self, spec: NodeSpec) {
        let node = Node::from(spec);

        // drop adjacency left behind by a node with the same id
        if let Some(previous) = self.nodes.remove(&node.id) {
            for dep in &previous.dependencies {
                if let Some(dependents) = self.edges.get_mut(dep) {
                    dependents.retain(|d| d != &previous.id);
                }
            }
        }

        for dep in &node.dependencies {
            self.edges
                .entry(dep.clone())
                .or_default()
                .push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }
}

/// Workflow graph shared between the validator and one scheduler run
#[derive(Debug, Default)]
pub struct Graph {
    inner: RwLock<GraphInner>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from decoded node specifications
    pub fn from_specs(specs: impl IntoIterator<Item = NodeSpec>) -> Self {
        let mut inner = GraphInner::default();
        for spec in specs {
            inner.insert(spec);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Decode a JSON workflow definition and build a graph from it
    pub fn from_json(content: &str) -> Result<Self, LoadError> {
        let file = crate::drago::workflow::loader::WorkflowLoader::parse_json(content)?;
        Ok(Self::from_specs(file.into_nodes()))
    }

    /// Insert or overwrite a node, reset it to `Pending` and link it to its
    /// declared dependencies
    pub async fn add_node(&self, spec: NodeSpec) {
        self.inner.write().await.insert(spec);
    }

    /// Bulk [`Graph::add_node`] over a decoded definition
    pub async fn load_from_definition(&self, specs: impl IntoIterator<Item = NodeSpec>) {
        let mut inner = self.inner.write().await;
        for spec in specs {
            inner.insert(spec);
        }
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().await
    }

    pub async fn node(&self, id: &str) -> Option<Node> {
        self.inner.read().await.nodes.get(id).cloned()
    }

    /// Snapshot of all nodes, sorted by id
    pub async fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.inner.read().await.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    pub async fn state_of(&self, id: &str) -> Option<NodeState> {
        self.inner.read().await.nodes.get(id).map(|n| n.state)
    }

    /// Ids of nodes that declared `id` as a dependency
    pub async fn dependents_of(&self, id: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .edges
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.nodes.is_empty()
    }

    /// Move a node to `to` if the lifecycle permits it
    pub async fn transition(&self, id: &str, to: NodeState) -> Result<Transition, ExecutionError> {
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| ExecutionError::UnknownNode(id.to_string()))?;

        let from = node.state;
        if !from.can_transition_to(to) {
            return Err(ExecutionError::InvalidTransition {
                node: id.to_string(),
                from,
                to,
            });
        }
        node.state = to;

        Ok(Transition {
            from,
            to,
            retry_count: node.retry_count,
        })
    }

    /// Move a running node to `Retrying` and consume one retry
    pub async fn begin_retry(&self, id: &str) -> Result<Transition, ExecutionError> {
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| ExecutionError::UnknownNode(id.to_string()))?;

        let from = node.state;
        if !from.can_transition_to(NodeState::Retrying) {
            return Err(ExecutionError::InvalidTransition {
                node: id.to_string(),
                from,
                to: NodeState::Retrying,
            });
        }
        node.state = NodeState::Retrying;
        node.retry_count += 1;

        Ok(Transition {
            from,
            to: NodeState::Retrying,
            retry_count: node.retry_count,
        })
    }
}
