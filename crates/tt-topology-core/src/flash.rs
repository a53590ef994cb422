// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! The flash planner: given a connection graph, a coordinate map, and a
//! layout, compute each ASIC's SPI parameter bytes and write them, finishing
//! with the L→R mirror copy for every dual-ASIC board's local side
//! (backend.py's `flash_to_default_state`/`flash_to_specified_state`).

use std::collections::HashMap;

use crate::constants::{
    ETH_PARAM_CHIP_COORD, ETH_PARAM_COORD_CHECK_DISABLE, ETH_PARAM_PORT_DISABLE,
    ETH_PARAM_RACK_SHELF, ETH_PARAM_RIGHT_OFFSET, ETH_PARAM_ROUTING_DISABLE,
    ISOLATED_LOCAL_PORT_DISABLE, ISOLATED_REMOTE_PORT_DISABLE, ROUTING_LEFT_EVEN,
    ROUTING_LEFT_ODD, ROUTING_RIGHT,
};
use crate::device::AsicDevice;
use crate::discovery;
use crate::error::{Result, TopologyError};
use crate::graph::{BoardFamily, ConnectionGraph, CoordinateMap, NodeIndex, Side};
use crate::layout::Layout;

/// Resolves the (owning local node, address offset) pair a node's SPI frame
/// lives at. Remote ASICs have no SPI controller of their own; every write
/// for them is issued against their local partner's device, offset by
/// `ETH_PARAM_RIGHT_OFFSET`.
pub fn frame_owner(graph: &ConnectionGraph, node: NodeIndex) -> Result<(NodeIndex, u32)> {
    match graph.node(node).side {
        Side::Local => Ok((node, 0)),
        Side::Remote => {
            let partner = graph.node(node).partner.ok_or_else(|| {
                TopologyError::Other(format!("remote ASIC {node} has no resolved local partner"))
            })?;
            Ok((partner, ETH_PARAM_RIGHT_OFFSET))
        }
    }
}

fn coord_bytes(x: u32, y: u32) -> [u8; 4] {
    [x as u8, y as u8, 0, 0]
}

fn mask_bytes(mask: u16) -> [u8; 4] {
    [(mask & 0xFF) as u8, ((mask >> 8) & 0xFF) as u8, 0, 0]
}

fn write_and_verify(
    device: &dyn AsicDevice,
    addr: u32,
    data: [u8; 4],
) -> Result<()> {
    device.spi_write(addr, &data)?;
    let mut readback = [0u8; 4];
    device.spi_read(addr, &mut readback)?;
    if readback != data {
        return Err(TopologyError::Other(format!(
            "SPI readback mismatch at {addr:#x}: wrote {data:?}, read {readback:?}"
        )));
    }
    Ok(())
}

/// The two cycle-adjacent nodes of `node` for a linear or torus layout,
/// derived from the already-assigned `(0, y)` coordinate map.
fn cycle_neighbours(
    coords: &CoordinateMap,
    node: NodeIndex,
    torus: bool,
) -> Vec<NodeIndex> {
    let n = coords.len();
    let by_y: HashMap<u32, NodeIndex> = coords.iter().map(|(&idx, &(_, y))| (y, idx)).collect();
    let Some(&(_, y)) = coords.get(&node) else {
        return Vec::new();
    };

    let mut neighbours = Vec::new();
    let prev = if y > 0 {
        Some(y - 1)
    } else if torus && n > 1 {
        Some(n as u32 - 1)
    } else {
        None
    };
    let next = if y + 1 < n as u32 {
        Some(y + 1)
    } else if torus && n > 1 {
        Some(0)
    } else {
        None
    };

    if let Some(py) = prev {
        if let Some(&idx) = by_y.get(&py) {
            neighbours.push(idx);
        }
    }
    if let Some(ny) = next {
        if let Some(&idx) = by_y.get(&ny) {
            neighbours.push(idx);
        }
    }
    neighbours
}

/// Port-disable mask for a linear/torus node: start fully disabled, clear
/// the bit for every port whose peer is a cycle-adjacent node (§4.5, S7).
fn linear_torus_mask(
    device: &dyn AsicDevice,
    identity_to_index: &HashMap<u64, NodeIndex>,
    neighbours: &[NodeIndex],
) -> Result<u16> {
    let mut mask: u16 = 0xFFFF;
    for port in 0u8..16 {
        let (x, y) = crate::constants::port_to_noc_xy(port);
        let remote_type = device.noc_read32(
            0,
            x,
            y,
            crate::constants::NOC_REMOTE_BASE + crate::constants::NOC_REMOTE_TYPE_WORD * 4,
        )?;
        let remote_id = device.noc_read32(
            0,
            x,
            y,
            crate::constants::NOC_REMOTE_BASE + crate::constants::NOC_REMOTE_ID_WORD * 4,
        )?;
        let identity = ((remote_type as u64) << 32) | remote_id as u64;
        if identity == 0 {
            continue;
        }
        if let Some(&peer) = identity_to_index.get(&identity) {
            if neighbours.contains(&peer) {
                mask &= !(1 << port);
            }
        }
    }
    Ok(mask)
}

fn isolated_mask(side: Side) -> [u8; 4] {
    match side {
        Side::Local => ISOLATED_LOCAL_PORT_DISABLE,
        Side::Remote => ISOLATED_REMOTE_PORT_DISABLE,
    }
}

/// Flashes every ASIC to its default, unconfigured state (§4.7 step 2):
/// left coord zero, right coord (1,0) for dual-ASIC boards, port-disable
/// zero unless `layout` is `Isolated`.
pub fn flash_defaults(
    devices: &[&dyn AsicDevice],
    graph: &ConnectionGraph,
    layout: Layout,
) -> Result<()> {
    for node in graph.indices() {
        let (owner, offset) = frame_owner(graph, node)?;
        let device = devices[owner.0];

        let coord = match graph.node(node).side {
            Side::Local => (0u32, 0u32),
            Side::Remote => (1u32, 0u32),
        };
        write_and_verify(device, ETH_PARAM_CHIP_COORD + offset, coord_bytes(coord.0, coord.1))?;

        let port_disable = if layout == Layout::Isolated {
            isolated_mask(graph.node(node).side)
        } else {
            [0, 0, 0, 0]
        };
        write_and_verify(device, ETH_PARAM_PORT_DISABLE + offset, port_disable)?;
        write_and_verify(device, ETH_PARAM_RACK_SHELF + offset, [0, 0, 0, 0])?;
    }

    copy_l_to_r_every_local_dual_asic(devices, graph)
}

/// Flashes the assigned coordinate map and layout-appropriate port-disable
/// masks (§4.5), then issues the L→R copy.
pub fn flash_specified_state(
    devices: &[&dyn AsicDevice],
    graph: &ConnectionGraph,
    coords: &CoordinateMap,
    layout: Layout,
) -> Result<()> {
    let identity_to_index = discovery::identity_index(devices)?;

    for node in graph.indices() {
        let (owner, offset) = frame_owner(graph, node)?;
        let device = devices[owner.0];
        let &(x, y) = coords
            .get(&node)
            .ok_or_else(|| TopologyError::Other(format!("no coordinate assigned for {node}")))?;

        write_and_verify(device, ETH_PARAM_CHIP_COORD + offset, coord_bytes(x, y))?;

        let mask: u16 = match layout {
            Layout::Mesh | Layout::MeshV2 => 0,
            Layout::Linear | Layout::Torus => {
                let torus = layout == Layout::Torus;
                let neighbours = cycle_neighbours(coords, node, torus);
                linear_torus_mask(devices[node.0], &identity_to_index, &neighbours)?
            }
            Layout::Isolated => {
                return Err(TopologyError::Other(
                    "flash_specified_state called for isolated layout".into(),
                ))
            }
        };
        write_and_verify(device, ETH_PARAM_PORT_DISABLE + offset, mask_bytes(mask))?;
    }

    copy_l_to_r_every_local_dual_asic(devices, graph)
}

/// Issues the ARC "SPI copy L→R" message for every local ASIC of a
/// dual-ASIC board exactly once (S9: one copy per flash phase per board).
fn copy_l_to_r_every_local_dual_asic(
    devices: &[&dyn AsicDevice],
    graph: &ConnectionGraph,
) -> Result<()> {
    for node in graph.indices() {
        let record = graph.node(node);
        if record.side == Side::Local && record.family == BoardFamily::DualAsic {
            devices[node.0].spi_copy_l_to_r()?;
        }
    }
    Ok(())
}

/// Whether the multi-host mesh patch applies to this run (§4.5): exactly
/// eight dual-ASIC ASICs and a mesh or mesh-v2 layout.
pub fn multihost_applies(graph: &ConnectionGraph, layout: Layout) -> bool {
    matches!(layout, Layout::Mesh | Layout::MeshV2)
        && graph.len() == 8
        && graph
            .nodes
            .iter()
            .all(|n| n.family == BoardFamily::DualAsic)
}

/// One entry of the multi-host patch: the node whose local frame receives
/// coord-check-disable=0 and the given left routing-disable value; its
/// partner's right frame always receives `ROUTING_RIGHT`.
struct PatchEntry {
    node: NodeIndex,
    routing_left: u16,
}

fn multihost_patch_plan(graph: &ConnectionGraph, coords: &CoordinateMap, layout: Layout) -> Vec<PatchEntry> {
    match layout {
        Layout::Mesh => {
            let mut plan = Vec::new();
            for (&node, &(x, y)) in coords.iter() {
                if graph.node(node).side != Side::Local {
                    continue;
                }
                if (x == 1 || x == 2) && y == 0 {
                    plan.push(PatchEntry { node, routing_left: ROUTING_LEFT_ODD });
                } else if (x == 1 || x == 2) && y == 1 {
                    plan.push(PatchEntry { node, routing_left: ROUTING_LEFT_EVEN });
                }
            }
            plan
        }
        Layout::MeshV2 => {
            let mut local_nodes: Vec<NodeIndex> = graph
                .indices()
                .filter(|&n| graph.node(n).side == Side::Local)
                .collect();
            local_nodes.sort_by_key(|n| n.0);

            local_nodes
                .into_iter()
                .enumerate()
                .map(|(slot, node)| PatchEntry {
                    node,
                    routing_left: if slot % 2 == 0 { ROUTING_LEFT_ODD } else { ROUTING_LEFT_EVEN },
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Applies the multi-host mesh patch (§4.5) and issues the L→R copy for
/// every patched board.
pub fn apply_multihost_patch(
    devices: &[&dyn AsicDevice],
    graph: &ConnectionGraph,
    coords: &CoordinateMap,
    layout: Layout,
) -> Result<()> {
    if !multihost_applies(graph, layout) {
        return Ok(());
    }

    for entry in multihost_patch_plan(graph, coords, layout) {
        let device = devices[entry.node.0];
        write_and_verify(device, ETH_PARAM_COORD_CHECK_DISABLE, [0, 0, 0, 0])?;
        write_and_verify(
            device,
            ETH_PARAM_ROUTING_DISABLE,
            mask_bytes(entry.routing_left),
        )?;
        write_and_verify(
            device,
            ETH_PARAM_ROUTING_DISABLE + ETH_PARAM_RIGHT_OFFSET,
            mask_bytes(ROUTING_RIGHT),
        )?;
        device.spi_copy_l_to_r()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    fn wired_pair(local_board: u64) -> (FakeDevice, FakeDevice) {
        let local = FakeDevice::new(local_board, Side::Local);
        let remote = FakeDevice::new(local_board, Side::Remote);
        local.wire_identity(1, 100);
        remote.wire_identity(1, 101);
        (local, remote)
    }

    fn pair_graph() -> ConnectionGraph {
        let mut g = ConnectionGraph::new();
        g.nodes.push(crate::graph::NodeRecord {
            index: NodeIndex(0),
            board_id: 1,
            family: BoardFamily::DualAsic,
            side: Side::Local,
            partner: None,
            edges: Vec::new(),
        });
        g.nodes.push(crate::graph::NodeRecord {
            index: NodeIndex(1),
            board_id: 1,
            family: BoardFamily::DualAsic,
            side: Side::Remote,
            partner: Some(NodeIndex(0)),
            edges: Vec::new(),
        });
        g.add_edge(NodeIndex(0), NodeIndex(1), crate::graph::EdgeKind::TrayFly);
        g
    }

    #[test]
    fn frame_owner_routes_remote_through_partner() {
        let g = pair_graph();
        assert_eq!(frame_owner(&g, NodeIndex(0)).unwrap(), (NodeIndex(0), 0));
        assert_eq!(
            frame_owner(&g, NodeIndex(1)).unwrap(),
            (NodeIndex(0), ETH_PARAM_RIGHT_OFFSET)
        );
    }

    #[test]
    fn default_flash_writes_isolated_pattern() {
        let (local, remote) = wired_pair(1);
        let g = pair_graph();
        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];

        flash_defaults(&devices, &g, Layout::Isolated).unwrap();

        assert_eq!(
            local.spi_bytes(ETH_PARAM_PORT_DISABLE, 4),
            ISOLATED_LOCAL_PORT_DISABLE
        );
        assert_eq!(
            local.spi_bytes(ETH_PARAM_PORT_DISABLE + ETH_PARAM_RIGHT_OFFSET, 4),
            ISOLATED_REMOTE_PORT_DISABLE
        );
        assert_eq!(local.spi_bytes(ETH_PARAM_CHIP_COORD, 4), [0, 0, 0, 0]);
        assert_eq!(
            local.spi_bytes(ETH_PARAM_CHIP_COORD + ETH_PARAM_RIGHT_OFFSET, 4),
            [1, 0, 0, 0]
        );
        assert_eq!(local.spi_copy_calls(), 1);
    }

    #[test]
    fn default_flash_zero_mask_outside_isolated() {
        let (local, remote) = wired_pair(1);
        let g = pair_graph();
        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];

        flash_defaults(&devices, &g, Layout::Linear).unwrap();

        assert_eq!(local.spi_bytes(ETH_PARAM_PORT_DISABLE, 4), [0, 0, 0, 0]);
    }

    #[test]
    fn mesh_layout_zeros_every_mask() {
        let (local, remote) = wired_pair(1);
        local.wire_peer(14, 1, 101);
        remote.wire_peer(6, 1, 100);
        let g = pair_graph();
        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];

        let mut coords = CoordinateMap::new();
        coords.insert(NodeIndex(0), (0, 0));
        coords.insert(NodeIndex(1), (1, 0));

        flash_specified_state(&devices, &g, &coords, Layout::Mesh).unwrap();

        assert_eq!(local.spi_bytes(ETH_PARAM_PORT_DISABLE, 4), [0, 0, 0, 0]);
        assert_eq!(
            local.spi_bytes(ETH_PARAM_PORT_DISABLE + ETH_PARAM_RIGHT_OFFSET, 4),
            [0, 0, 0, 0]
        );
    }

    #[test]
    fn linear_mask_clears_only_cycle_neighbour_bits() {
        let (local, remote) = wired_pair(1);
        // Local is the chain endpoint connected to `remote` via tray-fly port 14.
        local.wire_peer(14, 1, 101);
        remote.wire_peer(6, 1, 100);
        let g = pair_graph();
        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];

        let mut coords = CoordinateMap::new();
        coords.insert(NodeIndex(0), (0, 0));
        coords.insert(NodeIndex(1), (0, 1));

        flash_specified_state(&devices, &g, &coords, Layout::Linear).unwrap();

        let mask_bytes_read = local.spi_bytes(ETH_PARAM_PORT_DISABLE, 4);
        let mask = u16::from_le_bytes([mask_bytes_read[0], mask_bytes_read[1]]);
        assert_eq!(mask & (1 << 14), 0);
        assert_eq!(mask & (1 << 0), 1 << 0);
    }
}
