// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ethernet topology discovery and coordinate assignment for Tenstorrent
//! accelerator clusters: read the as-cabled connection graph off the wire,
//! validate it against the requested layout, assign grid coordinates, and
//! flash the result to every ASIC's SPI parameter table.

pub mod assign;
pub mod catalog;
pub mod constants;
pub mod device;
pub mod discovery;
pub mod error;
pub mod flash;
pub mod graph;
pub mod layout;
pub mod log;
pub mod orchestrate;
pub mod snapshot;
pub mod validate;

#[cfg(test)]
pub mod testing;

pub use error::{Result, TopologyError};
