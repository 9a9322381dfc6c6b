// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Chartmuseum-compatible HTTP chart registry.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::traits::{ChartMetadata, ChartRef, ChartRegistry, ChartRegistryError, USER_REPO};

/// Chart registry reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChartRegistry {
    client: Client,
    base_url: String,
}

impl HttpChartRegistry {
    /// Create a registry client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChartRegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChartRegistryError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Charts endpoint for a repo; `user` resolves to the team's own space.
    pub fn charts_url(&self, team_id: &str, repo: &str) -> String {
        if repo == USER_REPO {
            format!("{}/api/user/{}/charts", self.base_url, team_id)
        } else {
            format!("{}/api/public/{}/charts", self.base_url, repo)
        }
    }
}

#[async_trait]
impl ChartRegistry for HttpChartRegistry {
    async fn fetch_metadata(
        &self,
        team_id: &str,
        chart: &ChartRef,
    ) -> Result<ChartMetadata, ChartRegistryError> {
        let url = format!(
            "{}/{}/{}",
            self.charts_url(team_id, &chart.repo),
            chart.name,
            chart.version
        );
        debug!(url = %url, "Fetching chart metadata");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChartRegistryError::Unreachable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ChartRegistryError::NotFound(chart.to_string())),
            status if status.is_success() => response
                .json::<ChartMetadata>()
                .await
                .map_err(|e| ChartRegistryError::InvalidResponse(e.to_string())),
            status => Err(ChartRegistryError::InvalidResponse(format!(
                "{} returned {}",
                url, status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charts_url() {
        let registry =
            HttpChartRegistry::new("http://charts.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            registry.charts_url("team-1", "user"),
            "http://charts.local/api/user/team-1/charts"
        );
        assert_eq!(
            registry.charts_url("team-1", "stable"),
            "http://charts.local/api/public/stable/charts"
        );
    }
}
