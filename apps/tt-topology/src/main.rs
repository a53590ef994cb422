// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

mod cli;
mod device_source;
mod list;
mod render;
mod reset_json;

use clap::Parser;
use tt_topology_core::error::TopologyError;
use tt_topology_core::layout::Layout;
use tt_topology_core::orchestrate::{self, DeviceSource};

use cli::Cli;
use device_source::LiveDeviceSource;

fn install_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn run_list(source: &LiveDeviceSource) -> Result<(), TopologyError> {
    let devices = source.enumerate()?;
    let refs: Vec<&dyn tt_topology_core::device::AsicDevice> =
        devices.iter().map(|d| d.as_ref()).collect();
    let graph = tt_topology_core::discovery::bare_local_graph(&refs)?;
    let configs = tt_topology_core::snapshot::snapshot(&refs, &graph)?;
    list::print_table(&configs);
    Ok(())
}

fn default_log_path() -> std::path::PathBuf {
    tt_topology_core::log::RunLog::default_path(chrono::Utc::now())
}

fn main() {
    install_logging();
    let cli = Cli::parse();

    if cli.octopus {
        eprintln!("error: {}", TopologyError::OctopusUnsupported);
        std::process::exit(1);
    }

    if cli.generate_reset_json {
        match reset_json::ResetConfig::sample().to_json_pretty() {
            Ok(json) => {
                println!("{json}");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("error: failed to serialize sample reset config: {e}");
                std::process::exit(1);
            }
        }
    }

    let source = match LiveDeviceSource::new(cli.reset.clone()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if cli.list {
        if let Err(e) = run_list(&source) {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let layout: Layout = cli.layout;
    let outcome = orchestrate::run(&source, layout);

    let log_path = cli.log.clone().unwrap_or_else(default_log_path);
    if let Err(e) = outcome.log.write(&log_path) {
        eprintln!("warning: failed to write run log to {}: {e}", log_path.display());
    } else {
        tracing::info!(path = %log_path.display(), "wrote run log");
    }

    if let Some(coords) = &outcome.coordinates {
        let plot_path = &cli.plot_filename;
        // The graph isn't retained on `RunOutcome`; re-derive it from the
        // connection records already captured in the log for rendering.
        let mut graph = tt_topology_core::graph::ConnectionGraph::new();
        for (idx, _) in coords {
            graph.nodes.push(tt_topology_core::graph::NodeRecord {
                index: *idx,
                board_id: 0,
                family: tt_topology_core::graph::BoardFamily::Unknown,
                side: tt_topology_core::graph::Side::Local,
                partner: None,
                edges: Vec::new(),
            });
        }
        for record in &outcome.log.connections {
            graph.add_edge(
                tt_topology_core::graph::NodeIndex(record.from_index),
                tt_topology_core::graph::NodeIndex(record.to_index),
                record.kind,
            );
        }
        if let Err(e) = render::write_layout_description(plot_path, &graph, coords) {
            eprintln!("warning: failed to write layout description: {e}");
        }
    }

    match &outcome.log.error {
        Some(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
        None => std::process::exit(0),
    }
}
