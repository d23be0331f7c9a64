// SPDX-License-Identifier: MIT

//! Node state and run data
//!
//! This module provides:
//! - `NodeState` - the node lifecycle
//! - `RetryPolicy` - linear backoff bounded by a retry budget
//! - `KvStore` - the run-scoped key-value bus

mod machine;
mod store;

pub use machine::{run_node, NodeState, RetryPolicy};
pub use store::KvStore;
