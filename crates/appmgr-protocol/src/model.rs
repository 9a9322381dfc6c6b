// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared value types carried inside commands and reports.

use serde::{Deserialize, Serialize};

/// CPU, memory, and storage amounts.
///
/// Used for namespace limits (requested capacity) and usage (as reported by
/// heartbeats). Units are the ones the executors use: millicores, megabytes,
/// and megabytes respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantity {
    /// CPU in millicores.
    pub cpu: u32,
    /// Memory in megabytes.
    pub mem: u32,
    /// Storage in megabytes.
    pub storage: u32,
}

impl ResourceQuantity {
    /// Create a quantity from its three components.
    pub fn new(cpu: u32, mem: u32, storage: u32) -> Self {
        Self { cpu, mem, storage }
    }

    /// True when every component is non-zero.
    pub fn is_positive(&self) -> bool {
        self.cpu > 0 && self.mem > 0 && self.storage > 0
    }

    /// Component-wise sum, saturating at `u32::MAX`.
    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            cpu: self.cpu.saturating_add(other.cpu),
            mem: self.mem.saturating_add(other.mem),
            storage: self.storage.saturating_add(other.storage),
        }
    }
}

/// Reference to a chart in the chart registry, plus metadata resolved from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDetail {
    /// Repository: `stable`, `user`, or another public repository name.
    pub repo: String,
    /// Chart name.
    pub name: String,
    /// Chart version.
    pub version: String,
    /// Application version declared by the chart.
    #[serde(default)]
    pub app_version: String,
    /// Icon URL declared by the chart.
    #[serde(default)]
    pub icon: String,
    /// Description declared by the chart.
    #[serde(default)]
    pub description: String,
}

/// A single chart values override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomValue {
    /// Dotted values path.
    pub key: String,
    /// Override value.
    pub value: String,
}

impl CustomValue {
    /// Create a custom value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Namespace description sent with commands and echoed back in reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace id (`ns-...`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning team.
    pub team_id: String,
    /// Cluster the namespace is (or should be) placed on; empty if unassigned.
    #[serde(default)]
    pub cluster_id: String,
    /// Human readable cluster name; empty if unassigned.
    #[serde(default)]
    pub cluster_name: String,
    /// Requested capacity.
    pub limits: ResourceQuantity,
}
