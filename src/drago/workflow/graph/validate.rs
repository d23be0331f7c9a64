// SPDX-License-Identifier: MIT

//! Structural validation of a workflow graph
//!
//! This checks, in order:
//! - every dependency refers to a node in the graph
//! - every node type is a known kind
//! - the dependency edges form no cycle
//!
//! Validation is read-only and must finish before a run starts on the graph.

use std::collections::{HashMap, HashSet};

use super::model::{Graph, GraphInner};
use crate::drago::workflow::types::NodeKind;
use crate::engine::error::ValidationError;

/// Validate a graph under its read lock
pub async fn validate(graph: &Graph) -> Result<(), ValidationError> {
    let inner = graph.read().await;
    validate_inner(&inner)
}

pub(crate) fn validate_inner(inner: &GraphInner) -> Result<(), ValidationError> {
    let mut ids: Vec<&String> = inner.nodes.keys().collect();
    ids.sort();

    for id in &ids {
        let node = &inner.nodes[*id];
        for dep in &node.dependencies {
            if !inner.nodes.contains_key(dep) {
                return Err(ValidationError::MissingDependency {
                    node: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        if node.node_type.parse::<NodeKind>().is_err() {
            return Err(ValidationError::InvalidNodeType {
                node: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }

    // every edge source is a declared dependency, so it exists by now
    if let Some(path) = find_cycle(&ids, &inner.edges) {
        return Err(ValidationError::CycleDetected { path });
    }

    Ok(())
}

/// Depth-first search for a back edge.
///
/// The walk keeps an explicit stack of `(node, next edge index)` frames so
/// deep chains do not grow the call stack. The witness starts with the node
/// the back edge points to, then walks back up the stack until it reaches
/// that node again, e.g. `a -> c -> b -> a` for the edges `a -> b -> c -> a`.
fn find_cycle<'a>(
    roots: &[&'a String],
    edges: &'a HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    let mut visited: HashSet<&'a str> = HashSet::new();
    let mut on_stack: HashSet<&'a str> = HashSet::new();

    for root in roots {
        let root = root.as_str();
        if !visited.insert(root) {
            continue;
        }
        on_stack.insert(root);
        let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let id = frame.0;
            let dependents = edges.get(id).map(Vec::as_slice).unwrap_or(&[]);

            match dependents.get(frame.1) {
                Some(next) => {
                    frame.1 += 1;
                    let next = next.as_str();
                    if on_stack.contains(next) {
                        let path: Vec<&str> = stack.iter().map(|(id, _)| *id).collect();
                        return Some(witness(&path, next));
                    }
                    if visited.insert(next) {
                        on_stack.insert(next);
                        stack.push((next, 0));
                    }
                }
                None => {
                    on_stack.remove(id);
                    stack.pop();
                }
            }
        }
    }
    None
}

fn witness(stack: &[&str], closing: &str) -> Vec<String> {
    let start = stack.iter().rposition(|id| *id == closing).unwrap_or(0);
    std::iter::once(closing)
        .chain(stack[start..].iter().rev().copied())
        .map(str::to_string)
        .collect()
}
