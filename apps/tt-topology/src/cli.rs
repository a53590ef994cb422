// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::Parser;
use tt_topology_core::layout::Layout;

fn parse_layout(s: &str) -> Result<Layout, String> {
    s.parse()
}

#[derive(Parser, Debug)]
#[command(name = "tt-topology", version, about = "Configure the ethernet topology of a cluster of Tenstorrent boards")]
pub struct Cli {
    /// Logical layout to configure the cluster into.
    #[arg(long, value_parser = parse_layout, default_value = "linear")]
    pub layout: Layout,

    /// List detected ASICs and a heuristic classification of their current state, then exit.
    #[arg(long, short = 'l', visible_alias = "ls")]
    pub list: bool,

    /// Configure a rack-scale galaxy cluster. Not supported by this build.
    #[arg(long)]
    pub octopus: bool,

    /// Path to a reset-configuration JSON consumed by the reset collaborator.
    #[arg(long, short = 'r')]
    pub reset: Option<PathBuf>,

    /// Emit a sample reset-configuration JSON and exit.
    #[arg(long)]
    pub generate_reset_json: bool,

    /// Override the JSON run-log destination (default `~/tt_topology_logs/<timestamp>_log.json`).
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Override the rendered layout image path.
    #[arg(long, short = 'p', default_value = "chip_layout.png")]
    pub plot_filename: PathBuf,
}
