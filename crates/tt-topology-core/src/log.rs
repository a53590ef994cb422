// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! JSON run log, written on every run (success or failure), translated from
//! the Python original's `log.py` pydantic schema.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::System;

use crate::error::Result;
use crate::graph::{ConnectionGraph, EdgeKind, NodeIndex};
use crate::layout::Layout;
use crate::snapshot::ChipConfig;

#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub kernel: String,
    pub distro: String,
}

impl HostInfo {
    pub fn collect() -> Self {
        Self {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            os: System::name().unwrap_or_else(|| "unknown".to_string()),
            kernel: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            distro: System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRecord {
    pub from_index: usize,
    pub to_index: usize,
    pub kind: EdgeKind,
}

/// Flattens a connection graph into the run log's edge list, each undirected
/// edge recorded once (`from_index < to_index`).
pub fn connection_records(graph: &ConnectionGraph) -> Vec<ConnectionRecord> {
    let mut records = Vec::new();
    for node in graph.indices() {
        for &(peer, kind) in &graph.node(node).edges {
            if peer.0 > node.0 {
                records.push(ConnectionRecord {
                    from_index: node.0,
                    to_index: peer.0,
                    kind,
                });
            }
        }
    }
    records
}

#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub timestamp: DateTime<Utc>,
    pub host: HostInfo,
    pub layout: Layout,
    pub plot_path: Option<PathBuf>,
    pub starting_snapshot: Vec<ChipConfig>,
    pub post_default_snapshot: Vec<ChipConfig>,
    pub connections: Vec<ConnectionRecord>,
    pub coordinates: BTreeMap<usize, (u32, u32)>,
    pub final_snapshot: Vec<ChipConfig>,
    pub error: Option<String>,
}

impl RunLog {
    /// Default log directory: `~/tt_topology_logs/`.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tt_topology_logs")
    }

    /// Default log path for a given timestamp: `<dir>/<rfc3339-ish>_log.json`.
    pub fn default_path(timestamp: DateTime<Utc>) -> PathBuf {
        Self::default_dir().join(format!("{}_log.json", timestamp.format("%Y%m%dT%H%M%SZ")))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serializes and writes this log to `path`, creating parent directories
    /// as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Coordinate map indices translated from `NodeIndex` keys to the plain
/// `usize` keys the JSON schema uses.
pub fn coordinates_for_log(
    coords: &crate::graph::CoordinateMap,
) -> BTreeMap<usize, (u32, u32)> {
    coords.iter().map(|(idx, &coord)| (idx.0, coord)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BoardFamily, NodeRecord, Side};

    fn sample_graph() -> ConnectionGraph {
        let mut g = ConnectionGraph::new();
        for i in 0..2 {
            g.nodes.push(NodeRecord {
                index: NodeIndex(i),
                board_id: 1,
                family: BoardFamily::DualAsic,
                side: Side::Local,
                partner: None,
                edges: Vec::new(),
            });
        }
        g.add_edge(NodeIndex(0), NodeIndex(1), EdgeKind::Cable);
        g
    }

    #[test]
    fn connection_records_emit_each_edge_once() {
        let g = sample_graph();
        let records = connection_records(&g);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].from_index, 0);
        assert_eq!(records[0].to_index, 1);
    }

    #[test]
    fn default_path_is_under_the_default_dir() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let path = RunLog::default_path(ts);
        assert!(path.starts_with(RunLog::default_dir()));
        assert!(path.to_string_lossy().ends_with("_log.json"));
    }
}
