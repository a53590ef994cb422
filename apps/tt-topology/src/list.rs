// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! `--list`: print every detected ASIC with its current coordinate and a
//! heuristic guess at the layout currently flashed (§6).

use std::collections::BTreeSet;

use tt_topology_core::snapshot::ChipConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unconfigured,
    LinearOrTorus,
    Mesh,
    Undecipherable,
}

impl Classification {
    fn as_str(&self) -> &'static str {
        match self {
            Classification::Unconfigured => "unconfigured",
            Classification::LinearOrTorus => "linear/torus",
            Classification::Mesh => "mesh",
            Classification::Undecipherable => "undecipherable",
        }
    }
}

/// Classifies a set of chip coordinates (§6's `--list` heuristic).
pub fn classify(configs: &[ChipConfig]) -> Classification {
    let n = configs.len();
    if n == 0 {
        return Classification::Undecipherable;
    }

    let coords: Vec<(u8, u8)> = configs.iter().map(|c| c.coord).collect();

    if coords.iter().all(|&(x, y)| (x, y) == (0, 0) || (x, y) == (1, 0)) {
        return Classification::Unconfigured;
    }

    let ys: BTreeSet<u8> = coords.iter().map(|&(_, y)| y).collect();
    if coords.iter().all(|&(x, _)| x == 0) && ys == (0..n as u8).collect() {
        return Classification::LinearOrTorus;
    }

    let xs: BTreeSet<u8> = coords.iter().map(|&(x, _)| x).collect();
    let y_values: BTreeSet<u8> = coords.iter().map(|&(_, y)| y).collect();
    if xs.iter().all(|&x| (x as usize) < n / 2) && y_values.iter().all(|&y| y == 0 || y == 1) {
        return Classification::Mesh;
    }

    Classification::Undecipherable
}

pub fn print_table(configs: &[ChipConfig]) {
    let classification = classify(configs);
    println!("{:<5} {:<10} {:<8} {:<10} {:<12}", "index", "family", "side", "coord", "board_id");
    for config in configs {
        println!(
            "{:<5} {:<10?} {:<8?} {:<10} {:<12}",
            config.index,
            config.family,
            config.side,
            format!("({},{})", config.coord.0, config.coord.1),
            config.board_id
        );
    }
    println!("\nheuristic classification: {}", classification.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tt_topology_core::graph::{BoardFamily, Side};

    fn config(index: usize, coord: (u8, u8)) -> ChipConfig {
        ChipConfig {
            index,
            board_id: "0x0".to_string(),
            family: BoardFamily::DualAsic,
            side: Side::Local,
            fw_version: 1,
            coord,
            port_disable: 0,
            rack_shelf: (0, 0),
        }
    }

    #[test]
    fn classifies_unconfigured() {
        let configs = vec![config(0, (0, 0)), config(1, (1, 0))];
        assert_eq!(classify(&configs), Classification::Unconfigured);
    }

    #[test]
    fn classifies_linear() {
        let configs = vec![config(0, (0, 0)), config(1, (0, 1)), config(2, (0, 2))];
        assert_eq!(classify(&configs), Classification::LinearOrTorus);
    }
}
