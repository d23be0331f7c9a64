// SPDX-License-Identifier: MIT

pub mod drago;
pub mod engine;
