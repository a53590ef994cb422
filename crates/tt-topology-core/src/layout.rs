// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! The layout a run is targeting, selected by the CLI's `--layout` flag and
//! threaded through validation, assignment, and flashing.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layout {
    Linear,
    Torus,
    Mesh,
    MeshV2,
    Isolated,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Linear => "linear",
            Layout::Torus => "torus",
            Layout::Mesh => "mesh",
            Layout::MeshV2 => "mesh_v2",
            Layout::Isolated => "isolated",
        }
    }

    /// Whether a structural edge deficit is fatal for this layout (§4.3: "In
    /// mesh layouts missing edges are fatal; otherwise they are a soft
    /// warning").
    pub fn requires_exact_connectivity(&self) -> bool {
        matches!(self, Layout::Mesh | Layout::MeshV2)
    }
}

impl std::str::FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Layout::Linear),
            "torus" => Ok(Layout::Torus),
            "mesh" => Ok(Layout::Mesh),
            "mesh_v2" => Ok(Layout::MeshV2),
            "isolated" => Ok(Layout::Isolated),
            other => Err(format!("unknown layout {other:?}")),
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for layout in [
            Layout::Linear,
            Layout::Torus,
            Layout::Mesh,
            Layout::MeshV2,
            Layout::Isolated,
        ] {
            let parsed: Layout = layout.as_str().parse().unwrap();
            assert_eq!(parsed, layout);
        }
    }

    #[test]
    fn mesh_requires_exact_connectivity() {
        assert!(Layout::Mesh.requires_exact_connectivity());
        assert!(Layout::MeshV2.requires_exact_connectivity());
        assert!(!Layout::Linear.requires_exact_connectivity());
        assert!(!Layout::Torus.requires_exact_connectivity());
        assert!(!Layout::Isolated.requires_exact_connectivity());
    }
}
