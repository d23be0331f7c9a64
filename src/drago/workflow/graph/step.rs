//! Manual gating for single-step runs

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Proceed,
    Abort,
}

/// Decides whether the next node of a single-step run may execute
#[async_trait]
pub trait StepGate: Send {
    async fn confirm(&mut self, node_id: &str, dependencies: &[String]) -> StepDecision;
}

/// Waits for Enter on stdin before each node. End of input aborts the run.
pub struct StdinGate {
    lines: tokio::io::Lines<BufReader<tokio::io::Stdin>>,
}

impl StdinGate {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepGate for StdinGate {
    async fn confirm(&mut self, node_id: &str, dependencies: &[String]) -> StepDecision {
        let prompt = format!(
            "Next node: {} (dependencies: {:?}). Press Enter to execute...",
            node_id, dependencies
        );
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            log::warn!("Could not write step prompt to stdout");
        }

        match self.lines.next_line().await {
            Ok(Some(_)) => StepDecision::Proceed,
            Ok(None) => {
                log::warn!("stdin closed, aborting step run");
                StepDecision::Abort
            }
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                StepDecision::Abort
            }
        }
    }
}

/// Replays a fixed list of decisions, then proceeds; records what it was asked
#[derive(Debug, Default)]
pub struct ScriptedGate {
    decisions: VecDeque<StepDecision>,
    pub asked: Vec<(String, Vec<String>)>,
}

impl ScriptedGate {
    pub fn new(decisions: impl IntoIterator<Item = StepDecision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// A gate that approves every node
    pub fn always() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepGate for ScriptedGate {
    async fn confirm(&mut self, node_id: &str, dependencies: &[String]) -> StepDecision {
        self.asked
            .push((node_id.to_string(), dependencies.to_vec()));
        self.decisions.pop_front().unwrap_or(StepDecision::Proceed)
    }
}
