// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! The device facade: a narrow trait over chip I/O so that discovery, the
//! flash planner, and the state reader never touch `luwen_if` directly.
//! Keeping this trait thin is what lets the rest of the core be unit-tested
//! without hardware (see `crate::testing`).

use std::time::Duration;

use luwen_if::chip::ArcMsgOptions;
use luwen_if::{ArcMsg, ChipImpl};

use crate::error::{Result, TopologyError};
use crate::graph::Side;

/// One ASIC's I/O surface, as seen by discovery/flash/snapshot.
pub trait AsicDevice {
    /// Read `data.len()` bytes from SPI at the given 32-bit address.
    fn spi_read(&self, addr: u32, data: &mut [u8]) -> Result<()>;

    /// Write `data` to SPI at the given 32-bit address.
    fn spi_write(&self, addr: u32, data: &[u8]) -> Result<()>;

    /// Read a 32-bit NoC register at (ring, x, y, addr).
    fn noc_read32(&self, ring: u8, x: u8, y: u8, addr: u64) -> Result<u32>;

    /// Trigger the firmware's "SPI copy L→R" mirror routine. Only valid on
    /// the local side of a dual-ASIC board.
    fn spi_copy_l_to_r(&self) -> Result<()>;

    /// The 64-bit board serial this ASIC's board reports.
    fn board_id(&self) -> Result<u64>;

    /// Local (directly PCIe-attached) or Remote (reached via a local partner).
    fn side(&self) -> Side;
}

/// Reads a 4-byte NoC register and returns the concatenated big-endian word,
/// matching the Python tool's register layout (high half in the first
/// 32-bit word read, low half in the second).
pub fn read_noc_word64(dev: &dyn AsicDevice, ring: u8, x: u8, y: u8, addr: u64) -> Result<u64> {
    let high = dev.noc_read32(ring, x, y, addr)? as u64;
    let low = dev.noc_read32(ring, x, y, addr + 4)? as u64;
    Ok((high << 32) | low)
}

/// `AsicDevice` backed by a real `luwen_if` Wormhole chip handle.
pub struct LuwenAsicDevice<'a> {
    chip: &'a luwen_if::chip::Wormhole,
}

impl<'a> LuwenAsicDevice<'a> {
    pub fn new(chip: &'a luwen_if::chip::Wormhole) -> Self {
        Self { chip }
    }
}

impl<'a> AsicDevice for LuwenAsicDevice<'a> {
    fn spi_read(&self, addr: u32, data: &mut [u8]) -> Result<()> {
        self.chip
            .spi_read(addr, data)
            .map_err(|e| TopologyError::Other(e.to_string()))
    }

    fn spi_write(&self, addr: u32, data: &[u8]) -> Result<()> {
        self.chip
            .spi_write(addr, data)
            .map_err(|e| TopologyError::Other(e.to_string()))
    }

    fn noc_read32(&self, ring: u8, x: u8, y: u8, addr: u64) -> Result<u32> {
        use luwen_if::chip::HlComms;

        let mut buf = [0u8; 4];
        self.chip
            .noc_read(ring, x, y, addr, &mut buf)
            .map_err(|e| TopologyError::Other(e.to_string()))?;
        Ok(u32::from_le_bytes(buf))
    }

    fn spi_copy_l_to_r(&self) -> Result<()> {
        self.chip
            .arc_msg(ArcMsgOptions {
                msg: ArcMsg::SpiCopyLtoR,
                wait_for_done: true,
                timeout: Duration::from_secs(crate::constants::SPI_COPY_TIMEOUT_SECS),
                ..Default::default()
            })
            .map_err(TopologyError::Platform)?;
        Ok(())
    }

    fn board_id(&self) -> Result<u64> {
        Ok(self.chip.get_telemetry().map_err(TopologyError::Platform)?.board_id)
    }

    fn side(&self) -> Side {
        if self.chip.is_remote {
            Side::Remote
        } else {
            Side::Local
        }
    }
}
