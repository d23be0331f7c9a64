// SPDX-License-Identifier: MIT

//! Graph workflow scheduler
//!
//! Computes a topological order with Kahn's algorithm and drives every node
//! through its lifecycle, either concurrently under an admission gate or one
//! node at a time behind a [`StepGate`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::model::{Graph, Node};
use super::step::{StdinGate, StepDecision, StepGate};
use crate::drago::workflow::registry::HandlerRegistry;
use crate::drago::workflow::run::{RunContext, RunSummary};
use crate::drago::workflow::state::{run_node, KvStore, NodeState};
use crate::engine::error::ExecutionError;
use crate::engine::event::{Reporter, RunEvent};

/// How a run dispatches its nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Up to `workers` nodes in flight at once
    Parallel { workers: usize },
    /// One node at a time, each confirmed on stdin
    Step,
}

/// Carries a node's terminal state to its dependents once it is known
type Completion = watch::Receiver<Option<NodeState>>;

/// Drives one run of a validated graph
pub struct Scheduler {
    ctx: RunContext,
}

impl Scheduler {
    pub fn new(graph: Arc<Graph>, registry: HandlerRegistry, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            ctx: RunContext::new(
                graph,
                KvStore::new(),
                registry,
                reporter,
                CancellationToken::new(),
            ),
        }
    }

    /// Use a pre-seeded key-value bus instead of an empty one
    pub fn with_bus(mut self, bus: KvStore) -> Self {
        self.ctx.bus = bus;
        self
    }

    /// Observe an external cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.ctx.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.ctx.run_id
    }

    pub fn bus(&self) -> KvStore {
        self.ctx.bus.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// Topological order of the graph under its read lock
    pub async fn execution_order(&self) -> Result<Vec<String>, ExecutionError> {
        let inner = self.ctx.graph.read().await;
        topological_order(&inner.nodes, &inner.edges)
    }

    pub async fn run(self, mode: ExecutionMode) -> Result<RunSummary, ExecutionError> {
        match mode {
            ExecutionMode::Parallel { workers } => self.run_parallel(workers).await,
            ExecutionMode::Step => self.run_step(&mut StdinGate::new()).await,
        }
    }

    /// Run every node as its own task.
    ///
    /// A node starts only after all of its dependencies reached `Success`,
    /// then waits for one of `workers` admission permits and holds it until
    /// it is terminal. A node with a failed dependency is failed without
    /// running; unrelated branches continue.
    pub async fn run_parallel(self, workers: usize) -> Result<RunSummary, ExecutionError> {
        let started = Instant::now();
        let order = self.execution_order().await?;
        let ctx = Arc::new(self.ctx);
        let workers = workers.max(1);

        ctx.reporter.report(RunEvent::RunStarted {
            run_id: ctx.run_id,
            mode: format!("parallel(workers={})", workers),
            nodes: order.len(),
        });

        let gate = Arc::new(Semaphore::new(workers));
        let mut completions: HashMap<String, Completion> = HashMap::with_capacity(order.len());
        let mut tasks = JoinSet::new();

        for id in &order {
            let node = ctx
                .graph
                .node(id)
                .await
                .ok_or_else(|| ExecutionError::UnknownNode(id.clone()))?;

            // order is topological, so every dependency is already dispatched
            let upstream: Vec<(String, Completion)> = node
                .dependencies
                .iter()
                .filter_map(|dep| completions.get(dep).map(|c| (dep.clone(), c.clone())))
                .collect();

            let (done, completion) = watch::channel(None);
            completions.insert(id.clone(), completion);

            let ctx = ctx.clone();
            let gate = gate.clone();
            let id = id.clone();
            // if the task panics, `done` is dropped and dependents see it as a failure
            tasks.spawn(async move {
                let state = dispatch(&ctx, &gate, &id, upstream).await;
                let _ = done.send(Some(state));
            });
        }
        drop(completions);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("run={} node task panicked: {}", ctx.run_id, e);
            }
        }

        for id in &order {
            if !ctx.graph.state_of(id).await.is_some_and(|s| s.is_terminal()) {
                ctx.fail(id).await;
            }
        }

        Ok(ctx.summarize(order, started).await)
    }

    /// Run nodes strictly in topological order, asking `gate` before each one
    pub async fn run_step<G>(self, gate: &mut G) -> Result<RunSummary, ExecutionError>
    where
        G: StepGate + ?Sized,
    {
        let started = Instant::now();
        let order = self.execution_order().await?;
        let ctx = self.ctx;

        ctx.reporter.report(RunEvent::RunStarted {
            run_id: ctx.run_id,
            mode: "step".to_string(),
            nodes: order.len(),
        });

        for id in &order {
            let node = ctx
                .graph
                .node(id)
                .await
                .ok_or_else(|| ExecutionError::UnknownNode(id.clone()))?;

            if ctx.cancel.is_cancelled() {
                ctx.fail(id).await;
                continue;
            }
            if let Some(dep) = first_unsuccessful(&ctx.graph, &node).await {
                ctx.skip(id, &dep).await;
                continue;
            }

            ctx.reporter.report(RunEvent::AwaitingStep {
                run_id: ctx.run_id,
                node: id.clone(),
                dependencies: node.dependencies.clone(),
            });

            let decision = tokio::select! {
                _ = ctx.cancel.cancelled() => StepDecision::Abort,
                decision = gate.confirm(id, &node.dependencies) => decision,
            };
            if decision == StepDecision::Abort {
                log::warn!("run={} aborted before node {}", ctx.run_id, id);
                ctx.cancel.cancel();
                ctx.fail(id).await;
                continue;
            }

            run_node(&ctx, id).await;
        }

        Ok(ctx.summarize(order, started).await)
    }
}

async fn dispatch(
    ctx: &RunContext,
    gate: &Semaphore,
    id: &str,
    upstream: Vec<(String, Completion)>,
) -> NodeState {
    for (dep, completion) in upstream {
        let state = tokio::select! {
            _ = ctx.cancel.cancelled() => return ctx.fail(id).await,
            state = terminal_state(completion) => state,
        };
        if state != Some(NodeState::Success) {
            return ctx.skip(id, &dep).await;
        }
    }

    let _permit = tokio::select! {
        _ = ctx.cancel.cancelled() => return ctx.fail(id).await,
        permit = gate.acquire() => match permit {
            Ok(permit) => permit,
            Err(_) => return ctx.fail(id).await,
        },
    };

    run_node(ctx, id).await
}

/// Wait for a dependency's terminal state; `None` if its task died first
async fn terminal_state(mut completion: Completion) -> Option<NodeState> {
    match completion.wait_for(Option::is_some).await {
        Ok(state) => *state,
        Err(_) => None,
    }
}

async fn first_unsuccessful(graph: &Graph, node: &Node) -> Option<String> {
    for dep in &node.dependencies {
        if graph.state_of(dep).await != Some(NodeState::Success) {
            return Some(dep.clone());
        }
    }
    None
}

/// Kahn's algorithm over dependency counts and forward adjacency.
///
/// Ready nodes are seeded in id order; callers must not rely on how ties
/// between simultaneously ready nodes are broken.
pub fn topological_order(
    nodes: &HashMap<String, Node>,
    edges: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, ExecutionError> {
    let mut in_degree: HashMap<&str, usize> = nodes
        .values()
        .map(|n| (n.id.as_str(), n.dependencies.len()))
        .collect();

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_unstable();
    let mut queue: VecDeque<&str> = ready.into();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for dependent in edges.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    queue.push_back(dependent.as_str());
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let mut unplaced: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        unplaced.sort();
        return Err(ExecutionError::Unschedulable(unplaced));
    }

    Ok(order)
}
