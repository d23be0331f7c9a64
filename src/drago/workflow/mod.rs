// SPDX-License-Identifier: MIT

pub mod graph;
pub mod loader;
pub mod registry;
pub mod run;
pub mod state;
pub mod types;
