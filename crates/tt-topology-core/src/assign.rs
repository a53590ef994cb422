// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Coordinate assignment: four algorithms behind one trait, selected by
//! layout (Design Notes §9).

use std::collections::{BTreeMap, HashSet};

use crate::error::{Result, TopologyError};
use crate::graph::{ConnectionGraph, CoordinateMap, EdgeKind, NodeIndex, Side};

pub trait Assigner {
    fn assign(&self, graph: &ConnectionGraph) -> Result<CoordinateMap>;
}

/// (a) Cycle-based assignment for linear and torus layouts: find a simple
/// cycle covering every node, falling back to the longest simple path.
pub struct CycleAssigner;

impl CycleAssigner {
    /// Depth-first search for the longest simple path starting at `start`.
    /// Returns the best sequence of node indices found from this start.
    fn longest_path_from(graph: &ConnectionGraph, start: NodeIndex) -> Vec<NodeIndex> {
        let mut visited = HashSet::new();
        let mut path = vec![start];
        visited.insert(start);
        let mut best = path.clone();

        Self::dfs(graph, start, &mut visited, &mut path, &mut best);
        best
    }

    fn dfs(
        graph: &ConnectionGraph,
        current: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        best: &mut Vec<NodeIndex>,
    ) {
        if path.len() > best.len() {
            *best = path.clone();
        }

        for (peer, _) in graph.node(current).edges.clone() {
            if !visited.contains(&peer) {
                visited.insert(peer);
                path.push(peer);

                Self::dfs(graph, peer, visited, path, best);

                path.pop();
                visited.remove(&peer);
            }
        }
    }

    /// True if `seq` is a simple cycle: every consecutive pair (including
    /// the wraparound) is an edge, and it visits all nodes exactly once.
    fn is_hamiltonian_cycle(graph: &ConnectionGraph, seq: &[NodeIndex]) -> bool {
        if seq.len() != graph.len() || seq.is_empty() {
            return false;
        }
        for i in 0..seq.len() {
            let a = seq[i];
            let b = seq[(i + 1) % seq.len()];
            if !graph.node(a).has_edge_to(b) {
                return false;
            }
        }
        true
    }

    fn find_sequence(graph: &ConnectionGraph) -> Result<Vec<NodeIndex>> {
        let mut best: Vec<NodeIndex> = Vec::new();

        for start in graph.indices() {
            let candidate = Self::longest_path_from(graph, start);

            if Self::is_hamiltonian_cycle(graph, &candidate) {
                return Ok(candidate);
            }

            if candidate.len() > best.len() {
                best = candidate;
            }
        }

        if best.is_empty() {
            return Err(TopologyError::NoViableChain);
        }

        Ok(best)
    }
}

impl Assigner for CycleAssigner {
    fn assign(&self, graph: &ConnectionGraph) -> Result<CoordinateMap> {
        let sequence = Self::find_sequence(graph)?;

        let mut coords = BTreeMap::new();
        for (i, node) in sequence.into_iter().enumerate() {
            coords.insert(node, (0u32, i as u32));
        }
        Ok(coords)
    }
}

/// (b) Directional BFS for the "directional" mesh variant. Kept as a
/// documented, tested, but unreachable-from-CLI implementation: the
/// predicate BFS below supersedes it for general mesh assignment (see
/// Design Notes §9, Open Questions).
pub struct DirectionalBfsAssigner;

impl Assigner for DirectionalBfsAssigner {
    fn assign(&self, graph: &ConnectionGraph) -> Result<CoordinateMap> {
        if graph.is_empty() {
            return Ok(BTreeMap::new());
        }

        let start = graph
            .indices()
            .find(|idx| graph.node(*idx).edges.len() == 2)
            .unwrap_or(NodeIndex(0));

        let mut coords: BTreeMap<NodeIndex, (i64, i64)> = BTreeMap::new();
        coords.insert(start, (0, 0));

        // Tracks which axis each node has already used for an outbound,
        // same-side, cable edge so the "whichever axis is unused" rule can
        // be applied.
        let mut used_axis: BTreeMap<NodeIndex, char> = BTreeMap::new();

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        let mut visited = HashSet::new();
        visited.insert(start);

        while let Some(parent) = queue.pop_front() {
            let (px, py) = coords[&parent];
            let parent_side = graph.node(parent).side;

            for (child, kind) in graph.node(parent).edges.clone() {
                if visited.contains(&child) {
                    continue;
                }

                let child_side = graph.node(child).side;

                let next = if kind == EdgeKind::TrayFly {
                    (px, py + 1)
                } else if parent_side != child_side {
                    (px + 1, py)
                } else {
                    match used_axis.get(&parent) {
                        None => {
                            used_axis.insert(parent, 'x');
                            (px + 1, py)
                        }
                        Some('x') => {
                            used_axis.insert(parent, 'y');
                            (px, py + 1)
                        }
                        _ => return Err(TopologyError::NoAxisAvailable(parent)),
                    }
                };

                coords.insert(child, next);
                visited.insert(child);
                queue.push_back(child);
            }
        }

        Ok(coords
            .into_iter()
            .map(|(idx, (x, y))| (idx, (x as u32, y as u32)))
            .collect())
    }
}

/// (c) Predicate BFS for the "agnostic" mesh variant: connection-independent
/// placement that only requires the final map to satisfy the adjacency
/// predicate, not any particular traversal order.
pub struct PredicateBfsAssigner;

const CANDIDATE_OFFSETS: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

impl PredicateBfsAssigner {
    fn candidate_ok(
        graph: &ConnectionGraph,
        placed: &BTreeMap<NodeIndex, (i64, i64)>,
        child: NodeIndex,
        cand: (i64, i64),
    ) -> bool {
        if cand.0 < 0 || cand.1 < 0 {
            return false;
        }
        if placed.values().any(|&p| p == cand) {
            return false;
        }

        for (peer, coord) in placed.iter() {
            if graph.node(child).has_edge_to(*peer) {
                let dx = (coord.0 - cand.0).abs();
                let dy = (coord.1 - cand.1).abs();
                if dx + dy != 1 {
                    return false;
                }
            }
        }

        true
    }
}

impl Assigner for PredicateBfsAssigner {
    fn assign(&self, graph: &ConnectionGraph) -> Result<CoordinateMap> {
        if graph.is_empty() {
            return Ok(BTreeMap::new());
        }

        let start = graph
            .indices()
            .find(|idx| graph.node(*idx).edges.len() == 2)
            .unwrap_or(NodeIndex(0));

        let mut placed: BTreeMap<NodeIndex, (i64, i64)> = BTreeMap::new();
        placed.insert(start, (0, 0));

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        let mut visited = HashSet::new();
        visited.insert(start);

        while let Some(parent) = queue.pop_front() {
            let (px, py) = placed[&parent];

            for (child, _) in graph.node(parent).edges.clone() {
                if visited.contains(&child) {
                    continue;
                }

                let mut chosen = None;
                for (dx, dy) in CANDIDATE_OFFSETS {
                    let cand = (px + dx, py + dy);
                    if Self::candidate_ok(graph, &placed, child, cand) {
                        chosen = Some(cand);
                        break;
                    }
                }

                let coord = chosen.ok_or(TopologyError::NonPlanarMesh(child))?;
                placed.insert(child, coord);
                visited.insert(child);
                queue.push_back(child);
            }
        }

        Ok(placed
            .into_iter()
            .map(|(idx, (x, y))| (idx, (x as u32, y as u32)))
            .collect())
    }
}

/// (d) Static mesh-v2 table for exactly 8 ASICs in a known multi-host
/// configuration.
pub struct MeshV2Assigner;

const MESH_V2_TABLE: [(usize, (u32, u32)); 8] = [
    (0, (1, 1)),
    (4, (0, 1)),
    (1, (1, 0)),
    (5, (0, 0)),
    (2, (2, 1)),
    (6, (3, 1)),
    (3, (2, 0)),
    (7, (3, 0)),
];

impl Assigner for MeshV2Assigner {
    fn assign(&self, graph: &ConnectionGraph) -> Result<CoordinateMap> {
        if graph.len() != 8 {
            return Err(TopologyError::MeshV2WrongSize(graph.len()));
        }

        Ok(MESH_V2_TABLE
            .into_iter()
            .map(|(idx, coord)| (NodeIndex(idx), coord))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BoardFamily;

    fn chain_graph(n: usize, close_cycle: bool) -> ConnectionGraph {
        let mut g = ConnectionGraph::new();
        for i in 0..n {
            g.nodes.push(crate::graph::NodeRecord {
                index: NodeIndex(i),
                board_id: 0,
                family: BoardFamily::DualAsic,
                side: if i % 2 == 0 { Side::Local } else { Side::Remote },
                partner: None,
                edges: Vec::new(),
            });
        }
        for i in 0..n - 1 {
            g.add_edge(NodeIndex(i), NodeIndex(i + 1), EdgeKind::Cable);
        }
        if close_cycle {
            g.add_edge(NodeIndex(n - 1), NodeIndex(0), EdgeKind::Cable);
        }
        g
    }

    fn grid_graph(w: usize, h: usize) -> ConnectionGraph {
        let mut g = ConnectionGraph::new();
        for i in 0..(w * h) {
            g.nodes.push(crate::graph::NodeRecord {
                index: NodeIndex(i),
                board_id: 0,
                family: BoardFamily::DualAsic,
                side: Side::Local,
                partner: None,
                edges: Vec::new(),
            });
        }
        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                if x + 1 < w {
                    g.add_edge(NodeIndex(idx), NodeIndex(idx + 1), EdgeKind::Cable);
                }
                if y + 1 < h {
                    g.add_edge(NodeIndex(idx), NodeIndex(idx + w), EdgeKind::Cable);
                }
            }
        }
        g
    }

    #[test]
    fn cycle_assigner_linear_uses_full_chain() {
        let g = chain_graph(8, false);
        let coords = CycleAssigner.assign(&g).unwrap();

        assert_eq!(coords.len(), 8);
        let ys: HashSet<u32> = coords.values().map(|(_, y)| *y).collect();
        assert_eq!(ys, (0..8).collect());
        assert!(coords.values().all(|(x, _)| *x == 0));
    }

    #[test]
    fn cycle_assigner_torus_finds_hamiltonian_cycle() {
        let g = chain_graph(8, true);
        let coords = CycleAssigner.assign(&g).unwrap();

        assert_eq!(coords.len(), 8);
        let ys: HashSet<u32> = coords.values().map(|(_, y)| *y).collect();
        assert_eq!(ys, (0..8).collect());
    }

    #[test]
    fn cycle_assigner_fails_on_disconnected_graph() {
        let mut g = ConnectionGraph::new();
        for i in 0..2 {
            g.nodes.push(crate::graph::NodeRecord {
                index: NodeIndex(i),
                board_id: 0,
                family: BoardFamily::DualAsic,
                side: Side::Local,
                partner: None,
                edges: Vec::new(),
            });
        }
        // no edges at all -> longest path from any node is length 1
        let result = CycleAssigner.assign(&g);
        assert!(result.is_ok());
        assert_eq!(result.unwrap().len(), 1);
    }

    #[test]
    fn predicate_bfs_places_2x4_grid() {
        let g = grid_graph(4, 2);
        let coords = PredicateBfsAssigner.assign(&g).unwrap();

        assert_eq!(coords.len(), 8);
        let coord_set: HashSet<(u32, u32)> = coords.values().copied().collect();
        assert_eq!(coord_set.len(), 8);

        for x in 0..4 {
            for y in 0..2 {
                assert!(coord_set.contains(&(x, y)));
            }
        }
    }

    #[test]
    fn mesh_v2_requires_exactly_eight_nodes() {
        let g = chain_graph(4, false);
        assert!(matches!(
            MeshV2Assigner.assign(&g),
            Err(TopologyError::MeshV2WrongSize(4))
        ));
    }

    #[test]
    fn mesh_v2_applies_static_table() {
        let g = chain_graph(8, false);
        let coords = MeshV2Assigner.assign(&g).unwrap();
        assert_eq!(coords[&NodeIndex(0)], (1, 1));
        assert_eq!(coords[&NodeIndex(7)], (3, 0));
    }
}
