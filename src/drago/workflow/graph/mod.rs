// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! This module provides the graph model, its structural validator and the
//! scheduler that runs nodes once their dependencies have succeeded.

pub mod executor;
mod model;
pub mod step;
mod validate;

pub use executor::{topological_order, ExecutionMode, Scheduler};
pub use model::{Graph, Node, Transition};
pub use step::{ScriptedGate, StdinGate, StepDecision, StepGate};
pub use validate::validate;
