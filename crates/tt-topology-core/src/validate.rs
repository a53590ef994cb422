// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Structural validation of a discovered connection graph against the
//! requested layout, before coordinates are assigned.

use crate::error::{Result, TopologyError};
use crate::graph::ConnectionGraph;
use crate::layout::Layout;

/// The edge count a fully-cabled linear/torus chain of `n` ASICs is expected
/// to have: each board contributes one tray-fly link plus (on average) 1.5
/// cable links, rounded by the `(3n - 4) / 2` closed form used by the
/// Python tool's connectivity check.
pub fn expected_edge_count(n: usize) -> usize {
    if n < 2 {
        return 0;
    }
    (3 * n - 4) / 2
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub expected_edge_count: usize,
    /// True when edge_count < expected_edge_count.
    pub has_deficit: bool,
}

impl ValidationReport {
    pub fn is_deficient(&self) -> bool {
        self.has_deficit
    }
}

/// Validate `graph` for `layout`. Returns the report on success; for layouts
/// where `Layout::requires_exact_connectivity` is true a structural deficit
/// is returned as `TopologyError::StructuralDeficit` instead of a soft
/// warning in the report (§4.3).
pub fn validate(graph: &ConnectionGraph, layout: Layout) -> Result<ValidationReport> {
    let node_count = graph.len();
    let edge_count = graph.edge_count();
    let expected = expected_edge_count(node_count);
    let has_deficit = edge_count < expected;

    if has_deficit && layout.requires_exact_connectivity() {
        return Err(TopologyError::StructuralDeficit {
            expected,
            actual: edge_count,
        });
    }

    if has_deficit {
        tracing::warn!(
            expected,
            actual = edge_count,
            %layout,
            "connection graph has fewer edges than expected for a fully cabled chain"
        );
    }

    Ok(ValidationReport {
        node_count,
        edge_count,
        expected_edge_count: expected,
        has_deficit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BoardFamily, EdgeKind, NodeIndex, NodeRecord, Side};

    fn chain(n: usize, edges: &[(usize, usize)]) -> ConnectionGraph {
        let mut g = ConnectionGraph::new();
        for i in 0..n {
            g.nodes.push(NodeRecord {
                index: NodeIndex(i),
                board_id: i as u64,
                family: BoardFamily::DualAsic,
                side: Side::Local,
                partner: None,
                edges: Vec::new(),
            });
        }
        for &(a, b) in edges {
            g.add_edge(NodeIndex(a), NodeIndex(b), EdgeKind::Cable);
        }
        g
    }

    #[test]
    fn fully_cabled_pair_meets_expectation() {
        let g = chain(2, &[(0, 1)]);
        let report = validate(&g, Layout::Linear).unwrap();
        assert_eq!(report.expected_edge_count, 1);
        assert!(!report.has_deficit);
    }

    #[test]
    fn deficit_is_fatal_for_mesh() {
        let g = chain(4, &[(0, 1)]);
        assert!(matches!(
            validate(&g, Layout::Mesh),
            Err(TopologyError::StructuralDeficit { .. })
        ));
    }

    #[test]
    fn deficit_is_a_warning_for_linear() {
        let g = chain(4, &[(0, 1)]);
        let report = validate(&g, Layout::Linear).unwrap();
        assert!(report.has_deficit);
    }
}
