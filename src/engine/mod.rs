// SPDX-License-Identifier: MIT

//! Execution framework shared by every workflow
//!
//! - `error` - typed errors for loading, validation and execution
//! - `handler` - the `NodeHandler` extension point
//! - `event` - run events and reporters

pub mod error;
pub mod event;
pub mod handler;

pub use error::{DragoError, ExecutionError, LoadError, ValidationError};
pub use event::{ChannelReporter, LogReporter, Reporter, RunEvent};
pub use handler::{ExecutionParams, NodeHandler, NodeInput, SimulatedHandler};
