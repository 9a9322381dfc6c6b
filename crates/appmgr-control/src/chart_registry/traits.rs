// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Chart registry trait definitions.

use appmgr_protocol::ChartDetail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Repo name selecting the team's private chart space.
pub const USER_REPO: &str = "user";

/// Errors from chart registry lookups.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChartRegistryError {
    /// The chart version does not exist.
    #[error("Chart not found: {0}")]
    NotFound(String),

    /// The registry could not be reached.
    #[error("Registry unreachable: {0}")]
    Unreachable(String),

    /// The registry answered with something unusable.
    #[error("Unexpected registry response: {0}")]
    InvalidResponse(String),
}

/// Chart coordinates as given by a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartRef {
    /// Repository (`user` for the team's own charts).
    pub repo: String,
    /// Chart name.
    pub name: String,
    /// Chart version.
    pub version: String,
}

impl ChartRef {
    /// Create a chart reference.
    pub fn new(
        repo: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// True if every coordinate is present.
    pub fn is_complete(&self) -> bool {
        !self.repo.is_empty() && !self.name.is_empty() && !self.version.is_empty()
    }

    /// Full chart detail with resolved metadata.
    pub fn resolve(&self, metadata: ChartMetadata) -> ChartDetail {
        ChartDetail {
            repo: self.repo.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            app_version: metadata.app_version,
            icon: metadata.icon,
            description: metadata.description,
        }
    }
}

impl std::fmt::Display for ChartRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.repo, self.name, self.version)
    }
}

/// Metadata of one chart version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Version of the packaged application.
    #[serde(default)]
    pub app_version: String,
    /// Icon URL.
    #[serde(default)]
    pub icon: String,
    /// Human readable description.
    #[serde(default)]
    pub description: String,
}

/// Source of chart existence and metadata.
///
/// `team_id` scopes lookups in the `user` repo.
#[async_trait]
pub trait ChartRegistry: Send + Sync {
    /// Fetch metadata for a chart version.
    async fn fetch_metadata(
        &self,
        team_id: &str,
        chart: &ChartRef,
    ) -> Result<ChartMetadata, ChartRegistryError>;

    /// Check whether a chart version exists.
    async fn exists(&self, team_id: &str, chart: &ChartRef) -> Result<bool, ChartRegistryError> {
        match self.fetch_metadata(team_id, chart).await {
            Ok(_) => Ok(true),
            Err(ChartRegistryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
