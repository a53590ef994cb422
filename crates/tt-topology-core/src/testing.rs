// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! A hardware-free `AsicDevice` for unit and integration tests. Register
//! state lives behind a `RefCell` so tests can wire up responses before
//! exercising discovery/flash/snapshot without ever touching real silicon.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::constants::{
    port_to_noc_xy, NOC_LOCAL_BASE, NOC_LOCAL_ID_WORD, NOC_LOCAL_TYPE_WORD, NOC_REMOTE_BASE,
    NOC_REMOTE_ID_WORD, NOC_REMOTE_TYPE_WORD,
};
use crate::device::AsicDevice;
use crate::error::Result;
use crate::graph::Side;

#[derive(Default)]
struct State {
    noc: HashMap<(u8, u8, u8, u64), u32>,
    spi: HashMap<u32, u8>,
    spi_copy_calls: usize,
    spi_copy_should_fail: bool,
}

pub struct FakeDevice {
    board_id: u64,
    side: Side,
    state: RefCell<State>,
}

impl FakeDevice {
    pub fn new(board_id: u64, side: Side) -> Self {
        Self {
            board_id,
            side,
            state: RefCell::new(State::default()),
        }
    }

    /// Makes `read_identity` succeed on the given port with the given
    /// (type, id) pair.
    pub fn wire_identity(&self, board_type: u32, board_id_word: u32) {
        for port in 0u8..16 {
            let (x, y) = port_to_noc_xy(port);
            self.state.borrow_mut().noc.insert(
                (0, x, y, NOC_LOCAL_BASE + NOC_LOCAL_TYPE_WORD * 4),
                if port == 0 { board_type } else { 0 },
            );
            self.state
                .borrow_mut()
                .noc
                .insert((0, x, y, NOC_LOCAL_BASE + NOC_LOCAL_ID_WORD * 4), board_id_word);
        }
    }

    /// Wires a peer identity on the given port's remote-type/remote-id
    /// registers.
    pub fn wire_peer(&self, port: u8, peer_type: u32, peer_id: u32) {
        let (x, y) = port_to_noc_xy(port);
        let mut state = self.state.borrow_mut();
        state
            .noc
            .insert((0, x, y, NOC_REMOTE_BASE + NOC_REMOTE_TYPE_WORD * 4), peer_type);
        state
            .noc
            .insert((0, x, y, NOC_REMOTE_BASE + NOC_REMOTE_ID_WORD * 4), peer_id);
    }

    /// Directly sets an arbitrary NoC register, for tests that need more
    /// control than `wire_identity`/`wire_peer` give.
    pub fn set_noc(&self, ring: u8, x: u8, y: u8, addr: u64, value: u32) {
        self.state.borrow_mut().noc.insert((ring, x, y, addr), value);
    }

    pub fn spi_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        (0..len as u32)
            .map(|i| *state.spi.get(&(addr + i)).unwrap_or(&0))
            .collect()
    }

    pub fn set_spi_copy_should_fail(&self, should_fail: bool) {
        self.state.borrow_mut().spi_copy_should_fail = should_fail;
    }

    pub fn spi_copy_calls(&self) -> usize {
        self.state.borrow().spi_copy_calls
    }
}

impl AsicDevice for FakeDevice {
    fn spi_read(&self, addr: u32, data: &mut [u8]) -> Result<()> {
        let state = self.state.borrow();
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = *state.spi.get(&(addr + i as u32)).unwrap_or(&0);
        }
        Ok(())
    }

    fn spi_write(&self, addr: u32, data: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for (i, byte) in data.iter().enumerate() {
            state.spi.insert(addr + i as u32, *byte);
        }
        Ok(())
    }

    fn noc_read32(&self, ring: u8, x: u8, y: u8, addr: u64) -> Result<u32> {
        Ok(*self
            .state
            .borrow()
            .noc
            .get(&(ring, x, y, addr))
            .unwrap_or(&0))
    }

    fn spi_copy_l_to_r(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.spi_copy_calls += 1;
        if state.spi_copy_should_fail {
            return Err(crate::error::TopologyError::Other(
                "fake spi copy L->R failure".into(),
            ));
        }
        Ok(())
    }

    fn board_id(&self) -> Result<u64> {
        Ok(self.board_id)
    }

    fn side(&self) -> Side {
        self.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spi_read_after_write_round_trips() {
        let dev = FakeDevice::new(1, Side::Local);
        dev.spi_write(0x100, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        dev.spi_read(0x100, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn spi_copy_l_to_r_counts_calls() {
        let dev = FakeDevice::new(1, Side::Local);
        dev.spi_copy_l_to_r().unwrap();
        dev.spi_copy_l_to_r().unwrap();
        assert_eq!(dev.spi_copy_calls(), 2);
    }
}
