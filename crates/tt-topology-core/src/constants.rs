// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! SPI and NoC register offsets for the ethernet parameter table, ported
//! from the Python tool's `constants.py`.

pub const ETH_FW_VERSION_ADDR: u32 = 0x23210;

pub const ETH_PARAM_BASE_ADDR: u32 = 0x21100;
pub const ETH_PARAM_CHIP_COORD: u32 = ETH_PARAM_BASE_ADDR;
pub const ETH_PARAM_PORT_DISABLE: u32 = ETH_PARAM_BASE_ADDR + 0x8;
pub const ETH_PARAM_ROUTING_DISABLE: u32 = ETH_PARAM_BASE_ADDR + 0x48;
pub const ETH_PARAM_COORD_CHECK_DISABLE: u32 = ETH_PARAM_BASE_ADDR + 0x4C;
pub const ETH_PARAM_MOBO_ETH_ENABLE: u32 = ETH_PARAM_BASE_ADDR + 0xD0;
pub const ETH_PARAM_RACK_SHELF: u32 = ETH_PARAM_BASE_ADDR + 0xD4;

/// The right ASIC's SPI frame is the left frame shifted by this much.
pub const ETH_PARAM_RIGHT_OFFSET: u32 = 0x100;

/// Per-port NoC register bases, ring 0.
pub const NOC_LOCAL_BASE: u64 = 0x1000;
pub const NOC_LOCAL_TYPE_WORD: u64 = 56;
pub const NOC_LOCAL_ID_WORD: u64 = 59;

pub const NOC_REMOTE_BASE: u64 = 0x1EC0;
pub const NOC_REMOTE_TYPE_WORD: u64 = 72;
pub const NOC_REMOTE_ID_WORD: u64 = 73;

/// Decode an ethernet port number (0..15) into its NoC (x, y) coordinate.
pub fn port_to_noc_xy(port: u8) -> (u8, u8) {
    let x = if port % 2 == 1 {
        1 + (port % 8) / 2
    } else {
        9 - (port % 8) / 2
    };
    let y = if port > 7 { 6 } else { 0 };
    (x, y)
}

/// Tray-fly ("T") ports on the local side of a dual-ASIC board.
pub const TFLY_LOCAL_PORTS: [u8; 2] = [14, 15];
/// Tray-fly ("T") ports on the remote side of a dual-ASIC board.
pub const TFLY_REMOTE_PORTS: [u8; 2] = [6, 7];

/// Bit groups for the default-flash ("isolated") port-disable mask, named
/// per `flash_to_my_coords.py::generate_port_disble_mask`.
pub const QSFP_PORTS_MASK: u16 = 0xC300;
pub const TFLY_LOCAL_MASK: u16 = 0x0003;
pub const TFLY_REMOTE_MASK: u16 = 0x0300;
pub const LR_LOCAL_MASK: u16 = 0x0300;
pub const LR_REMOTE_MASK: u16 = 0xC000;

/// Exact default-flash ("isolated") port-disable bytes, as written by the
/// original `backend.py::flash_to_default_state`.
pub const ISOLATED_LOCAL_PORT_DISABLE: [u8; 4] = [0xFF, 0xFC, 0x00, 0x00];
pub const ISOLATED_REMOTE_PORT_DISABLE: [u8; 4] = [0xFC, 0xFF, 0x00, 0x00];

/// Routing-disable values written by the multi-host mesh patch.
pub const ROUTING_LEFT_ODD: u16 = 0xC002;
pub const ROUTING_LEFT_EVEN: u16 = 0x0302;
pub const ROUTING_RIGHT: u16 = 0x02;

/// Value written to enable the rack-scale ethernet link on a mobo.
pub const MOBO_ETH_ENABLE_VALUE: u8 = 0xC3;

/// Seconds to sleep after a default flash or specified-state flash before
/// resetting, to let the chips settle.
pub const SETTLE_SLEEP_SECS: u64 = 15;
/// Seconds to sleep after the multi-host mesh patch before the final reset.
pub const MESH_PATCH_SLEEP_SECS: u64 = 5;
/// Timeout for the "SPI copy L→R" ARC message.
pub const SPI_COPY_TIMEOUT_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_decoding_matches_spec_table() {
        assert_eq!(port_to_noc_xy(0), (9, 0));
        assert_eq!(port_to_noc_xy(1), (1, 0));
        assert_eq!(port_to_noc_xy(7), (4, 0));
        assert_eq!(port_to_noc_xy(8), (9, 6));
        assert_eq!(port_to_noc_xy(15), (4, 6));
    }

    #[test]
    fn right_frame_offsets_from_base() {
        assert_eq!(ETH_PARAM_CHIP_COORD + ETH_PARAM_RIGHT_OFFSET, 0x21200);
        assert_eq!(ETH_PARAM_PORT_DISABLE + ETH_PARAM_RIGHT_OFFSET, 0x21208);
    }
}
