// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock chart registry for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::traits::{ChartMetadata, ChartRef, ChartRegistry, ChartRegistryError};

/// In-memory chart registry; unknown charts are reported as missing.
#[derive(Debug, Clone, Default)]
pub struct MockChartRegistry {
    charts: Arc<Mutex<HashMap<ChartRef, ChartMetadata>>>,
    unreachable: Arc<AtomicBool>,
}

impl MockChartRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that fails every lookup as unreachable.
    pub fn unreachable() -> Self {
        let registry = Self::default();
        registry.unreachable.store(true, Ordering::SeqCst);
        registry
    }

    /// Register a chart version.
    pub async fn add_chart(&self, chart: ChartRef, metadata: ChartMetadata) {
        self.charts.lock().await.insert(chart, metadata);
    }
}

#[async_trait]
impl ChartRegistry for MockChartRegistry {
    async fn fetch_metadata(
        &self,
        _team_id: &str,
        chart: &ChartRef,
    ) -> Result<ChartMetadata, ChartRegistryError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ChartRegistryError::Unreachable("mock registry offline".to_string()));
        }
        self.charts
            .lock()
            .await
            .get(chart)
            .cloned()
            .ok_or_else(|| ChartRegistryError::NotFound(chart.to_string()))
    }
}
