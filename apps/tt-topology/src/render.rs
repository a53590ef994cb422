// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Layout rendering (§6, "Ambient: plotting collaborator"). The Python
//! original calls out to `matplotlib`/`networkx` from `tt_topology.py`; no
//! pack example pulls in a plotting crate, so this writes the coordinate and
//! edge data a renderer would consume and logs that image rendering itself
//! is not wired up, rather than silently dropping `--plot_filename`.

use std::path::Path;

use tt_topology_core::graph::{ConnectionGraph, CoordinateMap};

/// Writes a small text description of the coordinate map and graph edges
/// to `path`, in the shape a renderer would consume.
pub fn write_layout_description(
    path: &Path,
    graph: &ConnectionGraph,
    coords: &CoordinateMap,
) -> std::io::Result<()> {
    let mut lines = Vec::new();
    lines.push("nodes:".to_string());
    for (idx, &(x, y)) in coords {
        lines.push(format!("  {idx} ({x},{y})"));
    }
    lines.push("edges:".to_string());
    for node in graph.indices() {
        for &(peer, kind) in &graph.node(node).edges {
            if peer.0 > node.0 {
                lines.push(format!("  {node} -- {peer} [{kind:?}]"));
            }
        }
    }
    std::fs::write(path, lines.join("\n"))?;

    tracing::warn!(
        path = %path.display(),
        "wrote the layout description; image rendering is not wired to a renderer in this build"
    );
    Ok(())
}
