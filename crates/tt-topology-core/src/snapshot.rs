// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! State reader: snapshots the SPI parameter state of every board before and
//! after a flash phase, for the run log (§4.6).

use serde::Serialize;

use crate::constants::{
    ETH_FW_VERSION_ADDR, ETH_PARAM_CHIP_COORD, ETH_PARAM_PORT_DISABLE, ETH_PARAM_RACK_SHELF,
    ETH_PARAM_RIGHT_OFFSET,
};
use crate::device::AsicDevice;
use crate::error::{Result, TopologyError};
use crate::graph::{BoardFamily, ConnectionGraph, NodeIndex, Side};

/// One ASIC's SPI-resident state at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct ChipConfig {
    pub index: usize,
    pub board_id: String,
    pub family: BoardFamily,
    pub side: Side,
    pub fw_version: u32,
    pub coord: (u8, u8),
    pub port_disable: u16,
    pub rack_shelf: (u8, u8),
}

fn read_u32(device: &dyn AsicDevice, addr: u32) -> Result<u32> {
    let mut buf = [0u8; 4];
    device.spi_read(addr, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_config(
    own_device: &dyn AsicDevice,
    frame_device: &dyn AsicDevice,
    index: usize,
    board_id: u64,
    family: BoardFamily,
    side: Side,
    offset: u32,
) -> Result<ChipConfig> {
    // Firmware version is per-ASIC and readable from the ASIC's own handle
    // regardless of side; the coord/port-disable/rack-shelf triple lives in
    // the shared SPI frame owned by the local partner.
    let fw_version = read_u32(own_device, ETH_FW_VERSION_ADDR)?;
    let coord_word = read_u32(frame_device, ETH_PARAM_CHIP_COORD + offset)?;
    let port_disable_word = read_u32(frame_device, ETH_PARAM_PORT_DISABLE + offset)?;
    let rack_shelf_word = read_u32(frame_device, ETH_PARAM_RACK_SHELF + offset)?;

    Ok(ChipConfig {
        index,
        board_id: format!("{board_id:#018x}"),
        family,
        side,
        fw_version,
        coord: (coord_word as u8, (coord_word >> 8) as u8),
        port_disable: (port_disable_word & 0xFFFF) as u16,
        rack_shelf: (rack_shelf_word as u8, (rack_shelf_word >> 8) as u8),
    })
}

/// Snapshots every node in `graph`. Local-side ASICs are read directly;
/// remote ASICs are read through their local partner's right frame (§4.5),
/// since the SPI controller only exists on the local side.
pub fn snapshot(devices: &[&dyn AsicDevice], graph: &ConnectionGraph) -> Result<Vec<ChipConfig>> {
    let mut configs = Vec::with_capacity(graph.len());

    for node in graph.indices() {
        let record = graph.node(node);
        let (owner, offset) = match record.side {
            Side::Local => (node, 0u32),
            Side::Remote => {
                let partner = record.partner.ok_or_else(|| {
                    TopologyError::Other(format!("remote ASIC {node} has no resolved local partner"))
                })?;
                (partner, ETH_PARAM_RIGHT_OFFSET)
            }
        };

        configs.push(read_config(
            devices[node.0],
            devices[owner.0],
            node.0,
            record.board_id,
            record.family,
            record.side,
            offset,
        )?);
    }

    verify_firmware_agreement(&configs)?;
    Ok(configs)
}

fn verify_firmware_agreement(configs: &[ChipConfig]) -> Result<()> {
    let Some(first) = configs.first() else {
        return Ok(());
    };
    for other in &configs[1..] {
        if other.fw_version != first.fw_version {
            return Err(TopologyError::FirmwareMismatch {
                a: NodeIndex(first.index),
                a_version: first.fw_version,
                b: NodeIndex(other.index),
                b_version: other.fw_version,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    fn graph_pair() -> ConnectionGraph {
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
        g
    }

    #[test]
    fn snapshot_reads_both_sides_through_local_device() {
        let local = FakeDevice::new(1, Side::Local);
        let remote = FakeDevice::new(1, Side::Remote);
        local.spi_write(ETH_FW_VERSION_ADDR, &100u32.to_le_bytes()).unwrap();
        remote.spi_write(ETH_FW_VERSION_ADDR, &100u32.to_le_bytes()).unwrap();
        local.spi_write(ETH_PARAM_CHIP_COORD, &[0, 0, 0, 0]).unwrap();
        local
            .spi_write(ETH_PARAM_CHIP_COORD + ETH_PARAM_RIGHT_OFFSET, &[1, 0, 0, 0])
            .unwrap();

        let g = graph_pair();
        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];
        let configs = snapshot(&devices, &g).unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].coord, (0, 0));
        assert_eq!(configs[1].coord, (1, 0));
    }

    #[test]
    fn firmware_mismatch_is_fatal() {
        let local = FakeDevice::new(1, Side::Local);
        let remote = FakeDevice::new(1, Side::Remote);
        local.spi_write(ETH_FW_VERSION_ADDR, &100u32.to_le_bytes()).unwrap();
        remote.spi_write(ETH_FW_VERSION_ADDR, &101u32.to_le_bytes()).unwrap();

        let g = graph_pair();
        let devices: Vec<&dyn AsicDevice> = vec![&local, &remote];
        assert!(matches!(
            snapshot(&devices, &g),
            Err(TopologyError::FirmwareMismatch { .. })
        ));
    }
}
