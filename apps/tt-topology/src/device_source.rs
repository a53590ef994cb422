// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wires `tt_topology_core::orchestrate::DeviceSource` to real hardware:
//! `luwen_ref` for enumeration, the sibling `reset` binary for the reset
//! collaborator (§4.7 step 3's "invokes the `reset` collaborator binary's
//! logic as a library call" — realized here as a subprocess call, since
//! `apps/reset` exposes only a `main`, not a library).

use std::path::PathBuf;
use std::process::Command;

use luwen_if::ChipImpl;
use tt_topology_core::device::{AsicDevice, LuwenAsicDevice};
use tt_topology_core::error::{Result, TopologyError};
use tt_topology_core::orchestrate::DeviceSource;

pub struct LiveDeviceSource {
    reset_binary: PathBuf,
    reset_config: Option<PathBuf>,
}

impl LiveDeviceSource {
    pub fn new(reset_config: Option<PathBuf>) -> Result<Self> {
        let reset_binary = sibling_binary("reset")?;
        Ok(Self { reset_binary, reset_config })
    }
}

fn sibling_binary(name: &str) -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| TopologyError::Other(format!("cannot resolve current executable: {e}")))?;
    let dir = exe
        .parent()
        .ok_or_else(|| TopologyError::Other("executable has no parent directory".into()))?;
    let candidate = dir.join(name);
    if candidate.exists() {
        Ok(candidate)
    } else {
        Err(TopologyError::Other(format!(
            "could not find the `{name}` collaborator binary next to tt-topology at {}",
            dir.display()
        )))
    }
}

impl DeviceSource for LiveDeviceSource {
    fn enumerate(&self) -> Result<Vec<Box<dyn AsicDevice>>> {
        if !std::path::Path::new("/dev/tenstorrent").exists() {
            return Err(TopologyError::NoDriver);
        }

        let chips = luwen_ref::detect_initialized_chips().map_err(TopologyError::Luwen)?;
        if chips.is_empty() {
            return Err(TopologyError::NoDevices);
        }

        for chip in &chips {
            if chip.as_wh().is_none() {
                return Err(TopologyError::UnsupportedBoardMix(
                    "non-Wormhole ASIC detected; this build only supports n150/n300 boards"
                        .into(),
                ));
            }
        }

        // `LuwenAsicDevice` borrows its chip. Each enumeration leaks its
        // chip array for the rest of the process so every facade handed out
        // stays valid; a run performs a handful of enumerations total and
        // the process exits when it finishes, so this trades a bounded
        // amount of memory for not needing self-referential storage.
        let chips: &'static [luwen_if::chip::Chip] = Box::leak(chips.into_boxed_slice());

        Ok(chips
            .iter()
            .map(|chip| {
                let wh = chip.as_wh().expect("checked above");
                Box::new(LuwenAsicDevice::new(wh)) as Box<dyn AsicDevice>
            })
            .collect())
    }

    fn reset(&self) -> Result<()> {
        let mut command = Command::new(&self.reset_binary);
        // `apps/reset` doesn't parse a config file today; the path is still
        // passed through so a future reset-config-aware build picks it up.
        if let Some(config) = &self.reset_config {
            command.arg(config);
        }
        let status = command.status().map_err(|e| {
            TopologyError::Other(format!("failed to launch reset collaborator: {e}"))
        })?;
        if !status.success() {
            return Err(TopologyError::Other(format!(
                "reset collaborator exited with {status}"
            )));
        }
        Ok(())
    }

    fn local_count(&self) -> Result<usize> {
        Ok(ttkmd_if::PciDevice::scan().len())
    }
}
