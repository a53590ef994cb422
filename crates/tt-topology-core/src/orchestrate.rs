// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Orchestration: sequences one full run (§4.7). Reset and re-enumeration
//! are injected as closures so this module stays hardware-free and testable;
//! the CLI binary supplies the real collaborators (`apps/reset`,
//! `luwen_ref::detect_chips`).

use crate::assign::{Assigner, CycleAssigner, MeshV2Assigner, PredicateBfsAssigner};
use crate::device::AsicDevice;
use crate::discovery;
use crate::error::{Result, TopologyError};
use crate::flash;
use crate::graph::{ConnectionGraph, CoordinateMap};
use crate::layout::Layout;
use crate::log::{connection_records, coordinates_for_log, ConnectionRecord, HostInfo, RunLog};
use crate::snapshot::{self, ChipConfig};
use crate::validate;

/// A handle to one enumerated run of devices. The orchestrator re-enumerates
/// after every reset, since indices and remote availability change.
pub trait DeviceSource {
    /// Re-scans the host's devices, returning fresh `AsicDevice` handles in a
    /// stable order (local boards first, remote partners immediately after,
    /// matching `luwen_ref::detect_chips`'s own ordering).
    fn enumerate(&self) -> Result<Vec<Box<dyn AsicDevice>>>;

    /// Resets every local PCI interface (delegates to the `reset` collaborator).
    fn reset(&self) -> Result<()>;

    /// Count of local (directly PCIe-attached) devices, used for the
    /// post-reset enumeration-shortfall check.
    fn local_count(&self) -> Result<usize>;
}

pub struct RunOutcome {
    pub log: RunLog,
    pub coordinates: Option<CoordinateMap>,
}

fn as_trait_objects(devices: &[Box<dyn AsicDevice>]) -> Vec<&dyn AsicDevice> {
    devices.iter().map(|d| d.as_ref()).collect()
}

fn chip_configs_for(devices: &[Box<dyn AsicDevice>]) -> Result<Vec<ChipConfig>> {
    let refs = as_trait_objects(devices);
    let graph = discovery::bare_local_graph(&refs)?;
    snapshot::snapshot(&refs, &graph)
}

/// Picks the assigner for a layout (§4.4): mesh uses the predicate BFS,
/// mesh-v2 the static table, linear/torus the cycle assigner. Directional
/// BFS is implemented but intentionally unreachable here (Design Notes §9).
fn assigner_for(layout: Layout) -> Box<dyn Assigner> {
    match layout {
        Layout::Linear | Layout::Torus => Box::new(CycleAssigner),
        Layout::Mesh => Box::new(PredicateBfsAssigner),
        Layout::MeshV2 => Box::new(MeshV2Assigner),
        Layout::Isolated => Box::new(CycleAssigner),
    }
}

/// Executes one full run against `source` (§4.7, steps 1-13 minus the
/// plot-rendering step, which is a CLI-side concern).
pub fn run(source: &dyn DeviceSource, layout: Layout) -> RunOutcome {
    match run_inner(source, layout) {
        Ok(outcome) => outcome,
        Err(err) => RunOutcome {
            log: error_log(layout, err.to_string()),
            coordinates: None,
        },
    }
}

fn error_log(layout: Layout, error: String) -> RunLog {
    RunLog {
        timestamp: chrono::Utc::now(),
        host: HostInfo::collect(),
        layout,
        plot_path: None,
        starting_snapshot: Vec::new(),
        post_default_snapshot: Vec::new(),
        connections: Vec::new(),
        coordinates: Default::default(),
        final_snapshot: Vec::new(),
        error: Some(error),
    }
}

fn run_inner(source: &dyn DeviceSource, layout: Layout) -> Result<RunOutcome> {
    // 1. Snapshot starting state.
    let initial_devices = source.enumerate()?;
    let starting_snapshot = chip_configs_for(&initial_devices)?;

    // 2. Flash defaults.
    {
        let refs = as_trait_objects(&initial_devices);
        let bare = discovery::bare_local_graph(&refs)?;
        flash::flash_defaults(&refs, &bare, layout)?;
    }

    // 3. Sleep, then reset.
    std::thread::sleep(std::time::Duration::from_secs(crate::constants::SETTLE_SLEEP_SECS));
    source.reset()?;

    // 4. Re-enumerate; require at least 2x the local count.
    let post_reset_devices = source.enumerate()?;
    let local_count = source.local_count()?;
    if post_reset_devices.len() < 2 * local_count {
        return Err(TopologyError::PostResetShortfall {
            found: post_reset_devices.len(),
            expected: 2 * local_count,
        });
    }
    let post_default_snapshot = chip_configs_for(&post_reset_devices)?;

    // 5. If isolated, stop here.
    if layout == Layout::Isolated {
        let log = RunLog {
            timestamp: chrono::Utc::now(),
            host: HostInfo::collect(),
            layout,
            plot_path: None,
            starting_snapshot,
            post_default_snapshot: post_default_snapshot.clone(),
            connections: Vec::new(),
            coordinates: Default::default(),
            final_snapshot: post_default_snapshot,
            error: None,
        };
        return Ok(RunOutcome { log, coordinates: None });
    }

    // 6. Build graph; validate edge count.
    let refs = as_trait_objects(&post_reset_devices);
    let graph = discovery::discover(&refs)?;
    validate::validate(&graph, layout)?;

    // 7. Assign coordinates.
    let coords = assigner_for(layout).assign(&graph)?;

    // 8. Flash specified state.
    flash::flash_specified_state(&refs, &graph, &coords, layout)?;

    // 9. Sleep, reset, re-enumerate.
    std::thread::sleep(std::time::Duration::from_secs(crate::constants::SETTLE_SLEEP_SECS));
    source.reset()?;
    let post_flash_devices = source.enumerate()?;
    let post_flash_refs = as_trait_objects(&post_flash_devices);
    let post_flash_graph = discovery::discover(&post_flash_refs)?;

    // 10. Multi-host mesh patch, if applicable.
    if flash::multihost_applies(&post_flash_graph, layout) {
        flash::apply_multihost_patch(&post_flash_refs, &post_flash_graph, &coords, layout)?;
        std::thread::sleep(std::time::Duration::from_secs(
            crate::constants::MESH_PATCH_SLEEP_SECS,
        ));
        source.reset()?;
    }

    // 11. Snapshot final state.
    let final_devices = source.enumerate()?;
    let final_snapshot = chip_configs_for(&final_devices)?;

    let connections: Vec<ConnectionRecord> = connection_records(&graph);

    let log = RunLog {
        timestamp: chrono::Utc::now(),
        host: HostInfo::collect(),
        layout,
        plot_path: None,
        starting_snapshot,
        post_default_snapshot,
        connections,
        coordinates: coordinates_for_log(&coords),
        final_snapshot,
        error: None,
    };

    Ok(RunOutcome {
        log,
        coordinates: Some(coords),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Side;
    use crate::testing::FakeDevice;
    use std::cell::RefCell;

    /// A fixed pair of dual-ASIC boards that never changes shape across
    /// resets, enough to exercise the isolated-layout early exit.
    struct StaticPairSource {
        reset_calls: RefCell<usize>,
    }

    impl StaticPairSource {
        fn new() -> Self {
            Self { reset_calls: RefCell::new(0) }
        }

        fn devices() -> Vec<Box<dyn AsicDevice>> {
            let local = FakeDevice::new(((0x43u64 << 36) | 1), Side::Local);
            let remote = FakeDevice::new(((0x43u64 << 36) | 1), Side::Remote);
            local.spi_write(crate::constants::ETH_FW_VERSION_ADDR, &1u32.to_le_bytes()).unwrap();
            remote.spi_write(crate::constants::ETH_FW_VERSION_ADDR, &1u32.to_le_bytes()).unwrap();
            vec![Box::new(local), Box::new(remote)]
        }
    }

    impl DeviceSource for StaticPairSource {
        fn enumerate(&self) -> Result<Vec<Box<dyn AsicDevice>>> {
            Ok(Self::devices())
        }

        fn reset(&self) -> Result<()> {
            *self.reset_calls.borrow_mut() += 1;
            Ok(())
        }

        fn local_count(&self) -> Result<usize> {
            Ok(1)
        }
    }

    #[test]
    fn isolated_layout_stops_after_default_flash() {
        let source = StaticPairSource::new();
        let outcome = run(&source, Layout::Isolated);

        assert!(outcome.log.error.is_none());
        assert!(outcome.coordinates.is_none());
        assert_eq!(outcome.log.layout.as_str(), "isolated");
        assert_eq!(*source.reset_calls.borrow(), 1);
    }

    struct ShortfallSource;

    impl DeviceSource for ShortfallSource {
        fn enumerate(&self) -> Result<Vec<Box<dyn AsicDevice>>> {
            let local = FakeDevice::new(((0x43u64 << 36) | 1), Side::Local);
            local.spi_write(crate::constants::ETH_FW_VERSION_ADDR, &1u32.to_le_bytes()).unwrap();
            Ok(vec![Box::new(local)])
        }

        fn reset(&self) -> Result<()> {
            Ok(())
        }

        fn local_count(&self) -> Result<usize> {
            Ok(1)
        }
    }

    #[test]
    fn post_reset_shortfall_is_captured_in_the_log() {
        let outcome = run(&ShortfallSource, Layout::Linear);
        assert!(outcome.log.error.is_some());
        assert!(outcome.coordinates.is_none());
    }
}
