// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! The connection graph: discovery's output and the assigner/flash planner's
//! shared input.

use std::fmt;

use serde::Serialize;

/// Index of an ASIC within a single run, assigned in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeIndex(pub usize);

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Local,
    Remote,
}

/// A board family tag, derived from the board serial's unique-part-identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoardFamily {
    /// Single-ASIC card (n150).
    SingleAsic,
    /// Dual-ASIC card (n300).
    DualAsic,
    /// Recognized but not modeled in detail here.
    Other,
    Unknown,
}

/// Cable ("X") vs on-board tray-fly ("T") ethernet link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    Cable,
    TrayFly,
}

/// One ASIC's place in the connection graph.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub index: NodeIndex,
    /// 64-bit board serial (not the ethernet identity, which is only used
    /// to dedupe during discovery).
    pub board_id: u64,
    pub family: BoardFamily,
    pub side: Side,
    /// For a Remote node, the index of its Local partner on the same board.
    pub partner: Option<NodeIndex>,
    pub edges: Vec<(NodeIndex, EdgeKind)>,
}

impl NodeRecord {
    pub fn has_edge_to(&self, other: NodeIndex) -> bool {
        self.edges.iter().any(|(peer, _)| *peer == other)
    }

    pub fn edge_kind_to(&self, other: NodeIndex) -> Option<EdgeKind> {
        self.edges
            .iter()
            .find(|(peer, _)| *peer == other)
            .map(|(_, kind)| *kind)
    }
}

/// The full connection graph for one run: an index-keyed array of adjacency
/// records (see Design Notes — the ethernet-identity keying used during
/// discovery is translated away before this point).
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    pub nodes: Vec<NodeRecord>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeRecord {
        &self.nodes[idx.0]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut NodeRecord {
        &mut self.nodes[idx.0]
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    /// Record an undirected edge on both endpoints, unless it is already
    /// present on the source side.
    pub fn add_edge(&mut self, a: NodeIndex, b: NodeIndex, kind: EdgeKind) {
        if !self.node(a).has_edge_to(b) {
            self.node_mut(a).edges.push((b, kind));
        }
        if !self.node(b).has_edge_to(a) {
            self.node_mut(b).edges.push((a, kind));
        }
    }

    /// Total number of distinct undirected edges (each pair counted once).
    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.edges.iter().filter(|(peer, _)| peer.0 > n.index.0).count())
            .sum()
    }

    /// Checks the invariant that every edge appears symmetrically on both
    /// endpoints' edge lists.
    pub fn is_symmetric(&self) -> bool {
        self.nodes.iter().all(|n| {
            n.edges
                .iter()
                .all(|(peer, kind)| self.node(*peer).edge_kind_to(n.index) == Some(*kind))
        })
    }
}

/// Coordinates assigned to each node, keyed by node index.
pub type CoordinateMap = std::collections::BTreeMap<NodeIndex, (u32, u32)>;

#[cfg(test)]
mod tests {
    use super::*;

    fn node(index: usize, side: Side) -> NodeRecord {
        NodeRecord {
            index: NodeIndex(index),
            board_id: 0,
            family: BoardFamily::DualAsic,
            side,
            partner: None,
            edges: Vec::new(),
        }
    }

    #[test]
    fn add_edge_is_symmetric() {
        let mut g = ConnectionGraph::new();
        g.nodes.push(node(0, Side::Local));
        g.nodes.push(node(1, Side::Remote));

        g.add_edge(NodeIndex(0), NodeIndex(1), EdgeKind::Cable);

        assert!(g.node(NodeIndex(0)).has_edge_to(NodeIndex(1)));
        assert!(g.node(NodeIndex(1)).has_edge_to(NodeIndex(0)));
        assert!(g.is_symmetric());
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn add_edge_is_idempotent() {
        let mut g = ConnectionGraph::new();
        g.nodes.push(node(0, Side::Local));
        g.nodes.push(node(1, Side::Remote));

        g.add_edge(NodeIndex(0), NodeIndex(1), EdgeKind::Cable);
        g.add_edge(NodeIndex(0), NodeIndex(1), EdgeKind::Cable);

        assert_eq!(g.node(NodeIndex(0)).edges.len(), 1);
        assert_eq!(g.node(NodeIndex(1)).edges.len(), 1);
    }
}
