// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! `--generate_reset_json`: emit a sample reset-configuration document a
//! user can hand-edit before pointing `--reset` at it.

use serde::Serialize;

/// A single PCI interface's reset policy.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceResetConfig {
    pub pci_index: usize,
    pub reset_pcie_link: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetConfig {
    pub interfaces: Vec<InterfaceResetConfig>,
}

impl ResetConfig {
    /// A single-interface sample, matching `apps/reset`'s current default
    /// behaviour of resetting every detected interface's PCIe link.
    pub fn sample() -> Self {
        Self {
            interfaces: vec![InterfaceResetConfig {
                pci_index: 0,
                reset_pcie_link: true,
            }],
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_serializes_to_json() {
        let json = ResetConfig::sample().to_json_pretty().unwrap();
        assert!(json.contains("pci_index"));
        assert!(json.contains("reset_pcie_link"));
    }
}
