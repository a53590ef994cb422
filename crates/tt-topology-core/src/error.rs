// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::graph::NodeIndex;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("no tenstorrent driver found on this host")]
    NoDriver,

    #[error("no tenstorrent devices detected")]
    NoDevices,

    #[error("unsupported board mix: {0}")]
    UnsupportedBoardMix(String),

    #[error("ethernet identity unreadable on device index {0}")]
    IdentityUnreadable(usize),

    #[error("firmware version mismatch: device {a} reports {a_version:#x}, device {b} reports {b_version:#x}")]
    FirmwareMismatch {
        a: NodeIndex,
        a_version: u32,
        b: NodeIndex,
        b_version: u32,
    },

    #[error("structural validation failed: expected {expected} edges, found {actual}")]
    StructuralDeficit { expected: usize, actual: usize },

    #[error("no viable chain: graph has no Hamiltonian cycle and no non-empty longest path")]
    NoViableChain,

    #[error("no axis available for directional BFS at node {0}")]
    NoAxisAvailable(NodeIndex),

    #[error("non-planar mesh: no candidate coordinate satisfies the adjacency predicate for node {0}")]
    NonPlanarMesh(NodeIndex),

    #[error("mesh-v2 table requires exactly 8 ASICs, found {0}")]
    MeshV2WrongSize(usize),

    #[error("post-reset device count {found} is below the expected minimum {expected}")]
    PostResetShortfall { found: usize, expected: usize },

    #[error("rack-scale (octopus) topology is not supported by this build")]
    OctopusUnsupported,

    #[error(transparent)]
    Luwen(#[from] luwen_ref::error::LuwenError),

    #[error(transparent)]
    Platform(#[from] luwen_if::error::PlatformError),

    #[error("I/O error writing the run log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize the run log: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
