// SPDX-License-Identifier: MIT

pub mod loadtest;
pub mod server;
pub mod workflow;
