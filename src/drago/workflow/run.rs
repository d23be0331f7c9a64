// SPDX-License-Identifier: MIT

//! Per-run context and results

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::drago::workflow::graph::{Graph, Transition};
use crate::drago::workflow::registry::HandlerRegistry;
use crate::drago::workflow::state::{KvStore, NodeState};
use crate::engine::error::ExecutionError;
use crate::engine::event::{Reporter, RunEvent};

/// Everything a node execution needs, shared by all tasks of one run
pub struct RunContext {
    pub run_id: Uuid,
    pub graph: Arc<Graph>,
    pub bus: KvStore,
    pub registry: HandlerRegistry,
    pub reporter: Arc<dyn Reporter>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        graph: Arc<Graph>,
        bus: KvStore,
        registry: HandlerRegistry,
        reporter: Arc<dyn Reporter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            graph,
            bus,
            registry,
            reporter,
            cancel,
        }
    }

    /// Apply a state change and report it
    pub async fn transition(
        &self,
        node_id: &str,
        to: NodeState,
    ) -> Result<Transition, ExecutionError> {
        let transition = self.graph.transition(node_id, to).await?;
        self.report_transition(node_id, &transition);
        Ok(transition)
    }

    /// Move a running node to `Retrying`, consuming one retry
    pub async fn retry(&self, node_id: &str) -> Result<Transition, ExecutionError> {
        let transition = self.graph.begin_retry(node_id).await?;
        self.report_transition(node_id, &transition);
        Ok(transition)
    }

    /// Force a node into `Failed`. Returns the node's final state, which is
    /// unchanged if it was already terminal.
    pub async fn fail(&self, node_id: &str) -> NodeState {
        match self.transition(node_id, NodeState::Failed).await {
            Ok(_) => NodeState::Failed,
            Err(_) => self
                .graph
                .state_of(node_id)
                .await
                .unwrap_or(NodeState::Failed),
        }
    }

    /// Fail a node that will never run because `dependency` did not succeed
    pub async fn skip(&self, node_id: &str, dependency: &str) -> NodeState {
        self.reporter.report(RunEvent::UpstreamFailed {
            run_id: self.run_id,
            node: node_id.to_string(),
            dependency: dependency.to_string(),
        });
        self.fail(node_id).await
    }

    fn report_transition(&self, node_id: &str, transition: &Transition) {
        self.reporter.report(RunEvent::NodeTransition {
            run_id: self.run_id,
            node: node_id.to_string(),
            from: transition.from,
            to: transition.to,
            retry_count: transition.retry_count,
        });
    }

    pub(crate) async fn summarize(&self, order: Vec<String>, started: Instant) -> RunSummary {
        let nodes = self
            .graph
            .nodes()
            .await
            .into_iter()
            .map(|n| {
                (
                    n.id,
                    NodeOutcome {
                        state: n.state,
                        retry_count: n.retry_count,
                    },
                )
            })
            .collect();

        let summary = RunSummary {
            run_id: self.run_id,
            order,
            nodes,
            elapsed: started.elapsed(),
        };

        self.reporter.report(RunEvent::RunCompleted {
            run_id: self.run_id,
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            elapsed_ms: summary.elapsed.as_millis(),
        });
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeOutcome {
    pub state: NodeState,
    pub retry_count: u32,
}

/// Final view of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Topological order the scheduler dispatched in
    pub order: Vec<String>,
    pub nodes: BTreeMap<String, NodeOutcome>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn state_of(&self, node_id: &str) -> Option<NodeState> {
        self.nodes.get(node_id).map(|n| n.state)
    }

    pub fn succeeded(&self) -> usize {
        self.count(NodeState::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(NodeState::Failed)
    }

    /// Every node reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.nodes.values().all(|n| n.state.is_terminal())
    }

    pub fn all_succeeded(&self) -> bool {
        self.nodes.values().all(|n| n.state == NodeState::Success)
    }

    fn count(&self, state: NodeState) -> usize {
        self.nodes.values().filter(|n| n.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drago::workflow::types::NodeSpec;
    use crate::engine::event::ChannelReporter;

    fn context(specs: Vec<NodeSpec>) -> (RunContext, tokio::sync::mpsc::UnboundedReceiver<RunEvent>) {
        let (reporter, rx) = ChannelReporter::new();
        let ctx = RunContext::new(
            Arc::new(Graph::from_specs(specs)),
            KvStore::new(),
            HandlerRegistry::new(),
            Arc::new(reporter),
            CancellationToken::new(),
        );
        (ctx, rx)
    }

    #[tokio::test]
    async fn test_skip_reports_upstream_and_fails() {
        let (ctx, mut rx) = context(vec![
            NodeSpec::new("a", "trigger"),
            NodeSpec::new("b", "action").depends_on(["a"]),
        ]);

        assert_eq!(ctx.skip("b", "a").await, NodeState::Failed);

        match rx.try_recv().unwrap() {
            RunEvent::UpstreamFailed { node, dependency, .. } => {
                assert_eq!(node, "b");
                assert_eq!(dependency, "a");
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.try_recv().unwrap() {
            RunEvent::NodeTransition { from, to, .. } => {
                assert_eq!(from, NodeState::Pending);
                assert_eq!(to, NodeState::Failed);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fail_keeps_terminal_success() {
        let (ctx, _rx) = context(vec![NodeSpec::new("a", "trigger")]);
        ctx.transition("a", NodeState::Running).await.unwrap();
        ctx.transition("a", NodeState::Success).await.unwrap();

        assert_eq!(ctx.fail("a").await, NodeState::Success);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let (ctx, mut rx) = context(vec![
            NodeSpec::new("a", "trigger"),
            NodeSpec::new("b", "action"),
        ]);
        ctx.transition("a", NodeState::Running).await.unwrap();
        ctx.transition("a", NodeState::Success).await.unwrap();

        let partial = ctx.summarize(vec!["a".into(), "b".into()], Instant::now()).await;
        assert!(!partial.is_complete());

        ctx.fail("b").await;
        let summary = ctx.summarize(vec!["a".into(), "b".into()], Instant::now()).await;
        assert!(summary.is_complete());
        assert!(!summary.all_succeeded());
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.state_of("b"), Some(NodeState::Failed));

        let completed = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, RunEvent::RunCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
    }
}
