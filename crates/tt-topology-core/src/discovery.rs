// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connection graph discovery: read each ASIC's ethernet identity and port
//! registers, and reconstruct the undirected multigraph of ASIC-to-ASIC
//! links (backend.py's `generate_connection_map`, generalized to probe every
//! port for the local identity rather than a single fixed eth core so that
//! discovery keeps working across firmware versions that relocate it).

use std::collections::HashMap;

use crate::constants::{
    port_to_noc_xy, NOC_LOCAL_BASE, NOC_LOCAL_ID_WORD, NOC_LOCAL_TYPE_WORD, NOC_REMOTE_BASE,
    NOC_REMOTE_ID_WORD, NOC_REMOTE_TYPE_WORD, TFLY_LOCAL_PORTS, TFLY_REMOTE_PORTS,
};
use crate::device::AsicDevice;
use crate::error::{Result, TopologyError};
use crate::graph::{BoardFamily, ConnectionGraph, EdgeKind, NodeIndex, NodeRecord, Side};

/// Build a connectionless graph of the given devices, one node per device in
/// list order. Used for the pre-discovery snapshots (§4.7 steps 1 and 4),
/// where only family/side/board-id are needed, not the cabling.
pub fn bare_local_graph(devices: &[&dyn AsicDevice]) -> Result<ConnectionGraph> {
    let mut graph = ConnectionGraph::new();
    for (i, dev) in devices.iter().enumerate() {
        let board_id = dev.board_id()?;
        graph.nodes.push(NodeRecord {
            index: NodeIndex(i),
            board_id,
            family: crate::catalog::board_family(board_id),
            side: dev.side(),
            partner: None,
            edges: Vec::new(),
        });
    }

    for i in 0..graph.nodes.len() {
        if graph.nodes[i].side == Side::Remote {
            let board_id = graph.nodes[i].board_id;
            let partner = graph
                .nodes
                .iter()
                .find(|n| n.board_id == board_id && n.side == Side::Local)
                .map(|n| n.index);
            graph.nodes[i].partner = partner;
        }
    }

    Ok(graph)
}

/// Reads the 64-bit ethernet identity of one ASIC by probing every port's
/// local-type/local-id registers and taking the first non-zero type.
fn read_identity(device: &dyn AsicDevice) -> Result<u64> {
    for port in 0u8..16 {
        let (x, y) = port_to_noc_xy(port);
        let board_type = device.noc_read32(0, x, y, NOC_LOCAL_BASE + NOC_LOCAL_TYPE_WORD * 4)?;
        if board_type != 0 {
            let board_id = device.noc_read32(0, x, y, NOC_LOCAL_BASE + NOC_LOCAL_ID_WORD * 4)?;
            return Ok(((board_type as u64) << 32) | board_id as u64);
        }
    }
    Err(TopologyError::Other(
        "ethernet identity unreadable: every port reported a zero board type".into(),
    ))
}

/// Reads the peer identity connected to `port`, or `None` if the port is
/// unconnected.
fn read_peer_identity(device: &dyn AsicDevice, port: u8) -> Result<Option<u64>> {
    let (x, y) = port_to_noc_xy(port);
    let remote_type = device.noc_read32(0, x, y, NOC_REMOTE_BASE + NOC_REMOTE_TYPE_WORD * 4)?;
    let remote_id = device.noc_read32(0, x, y, NOC_REMOTE_BASE + NOC_REMOTE_ID_WORD * 4)?;
    let identity = ((remote_type as u64) << 32) | remote_id as u64;
    Ok(if identity == 0 { None } else { Some(identity) })
}

fn edge_kind(family: BoardFamily, side: Side, port: u8) -> EdgeKind {
    let is_tray_fly = match (family, side) {
        (BoardFamily::DualAsic, Side::Local) => TFLY_LOCAL_PORTS.contains(&port),
        (BoardFamily::DualAsic, Side::Remote) => TFLY_REMOTE_PORTS.contains(&port),
        _ => false,
    };
    if is_tray_fly {
        EdgeKind::TrayFly
    } else {
        EdgeKind::Cable
    }
}

/// Discover the connection graph across every given ASIC handle (§4.2).
///
/// `devices` must be ordered consistently with how the caller wants node
/// indices assigned; this is the order discovery returns as well.
pub fn discover(devices: &[&dyn AsicDevice]) -> Result<ConnectionGraph> {
    let mut identities = Vec::with_capacity(devices.len());
    let mut identity_to_index: HashMap<u64, NodeIndex> = HashMap::new();

    let mut graph = ConnectionGraph::new();
    for (i, dev) in devices.iter().enumerate() {
        let identity =
            read_identity(*dev).map_err(|_| TopologyError::IdentityUnreadable(i))?;
        let board_id = dev.board_id()?;
        let family = crate::catalog::board_family(board_id);
        let side = dev.side();

        graph.nodes.push(NodeRecord {
            index: NodeIndex(i),
            board_id,
            family,
            side,
            partner: None,
            edges: Vec::new(),
        });
        identities.push(identity);
        identity_to_index.insert(identity, NodeIndex(i));
    }

    // Resolve each remote ASIC's local partner: same board serial, Local side.
    for i in 0..graph.nodes.len() {
        if graph.nodes[i].side == Side::Remote {
            let board_id = graph.nodes[i].board_id;
            let partner = graph
                .nodes
                .iter()
                .find(|n| n.board_id == board_id && n.side == Side::Local)
                .map(|n| n.index);
            graph.nodes[i].partner = partner;
        }
    }

    for (i, dev) in devices.iter().enumerate() {
        let node = NodeIndex(i);
        let family = graph.node(node).family;
        let side = graph.node(node).side;

        for port in 0u8..16 {
            let Some(peer_identity) = read_peer_identity(*dev, port)? else {
                continue;
            };

            let Some(&peer) = identity_to_index.get(&peer_identity) else {
                tracing::warn!(
                    device = i,
                    port,
                    "port reports a peer not present in the local graph; it belongs to a chip on another host, skipping"
                );
                continue;
            };

            if !graph.node(node).has_edge_to(peer) {
                graph.add_edge(node, peer, edge_kind(family, side, port));
            }
        }
    }

    Ok(graph)
}

/// Rebuilds the identity→index lookup for a graph already discovered, for
/// use by the flash planner's independent per-port peer scan (§4.5).
pub fn identity_index(devices: &[&dyn AsicDevice]) -> Result<HashMap<u64, NodeIndex>> {
    let mut map = HashMap::new();
    for (i, dev) in devices.iter().enumerate() {
        let identity = read_identity(*dev).map_err(|_| TopologyError::IdentityUnreadable(i))?;
        map.insert(identity, NodeIndex(i));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    fn n300(board_id: u64, side: Side) -> FakeDevice {
        FakeDevice::new(board_id, side)
    }

    #[test]
    fn discovers_a_single_n300_board() {
        let local = n300(((0x43u64 << 36) | 1), Side::Local);
        let remote = n300(((0x43u64 << 36) | 1), Side::Remote);
        local.wire_identity(1, 100);
        remote.wire_identity(1, 101);
        local.wire_peer(14, 1, 101);
        remote.wire_peer(6, 1, 100);

        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];
        let graph = discover(&devices).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.is_symmetric());
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(
            graph.node(NodeIndex(0)).edge_kind_to(NodeIndex(1)),
            Some(EdgeKind::TrayFly)
        );
        assert_eq!(graph.node(NodeIndex(1)).partner, Some(NodeIndex(0)));
    }

    #[test]
    fn skips_peer_on_another_host_with_a_warning() {
        let local = n300(((0x43u64 << 36) | 1), Side::Local);
        local.wire_identity(1, 100);
        // Port 0 reports a peer identity that is not in the local graph.
        local.wire_peer(0, 9, 999);

        let devices: Vec<&dyn AsicDevice> = vec![&local];
        let graph = discover(&devices).unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn fails_when_identity_is_entirely_unreadable() {
        let local = FakeDevice::new(((0x43u64 << 36) | 1), Side::Local);
        // No ports wired with a non-zero local type.
        let devices: Vec<&dyn AsicDevice> = vec![&local];
        assert!(matches!(
            discover(&devices),
            Err(TopologyError::IdentityUnreadable(0))
        ));
    }
}
