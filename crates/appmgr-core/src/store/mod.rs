// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State store interfaces and backends for appmgr-core.
//!
//! This module defines the record types, the [`StateStore`] abstraction and
//! its backend implementations. Writers that depend on the current status go
//! through the `*_if` compare-and-swap methods, which apply an update only
//! while the stored status is one of the expected values.

pub mod memory;
pub mod postgres;

pub use self::memory::InMemoryStore;
pub use self::postgres::PostgresStore;

use appmgr_protocol::{
    AppDeployment, AppEvent, AppStatus, ChartDetail, ClusterStatus, CustomValue, HeartbeatMetrics,
    Namespace, NamespaceEvent, NamespaceStatus, ResourceQuantity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::lifecycle::{Lifecycle, ManagedResource};

/// Suffix of the public hostname assigned to apps.
pub const ENDPOINT_DOMAIN: &str = "ankr.com";

// ============================================================================
// Record Types
// ============================================================================

/// Namespace record.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceRecord {
    /// Unique identifier (`ns-<uuid>`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Pending name while an update is in flight.
    pub name_updating: Option<String>,
    /// Owning team.
    pub team_id: String,
    /// Creating user.
    pub creator: String,
    /// Assigned cluster; empty until the executor places the namespace.
    pub cluster_id: String,
    /// Assigned cluster's display name.
    pub cluster_name: String,
    /// Requested capacity.
    pub limits: ResourceQuantity,
    /// Pending capacity while an update is in flight.
    pub limits_updating: Option<ResourceQuantity>,
    /// Usage reported by heartbeats.
    pub usage: ResourceQuantity,
    /// Lifecycle status.
    pub status: NamespaceStatus,
    /// Cause of the last transition.
    pub event: NamespaceEvent,
    /// Hidden from listings.
    pub hidden: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub last_modified: DateTime<Utc>,
}

impl NamespaceRecord {
    /// True once the executor has placed the namespace on a cluster.
    pub fn has_cluster(&self) -> bool {
        !self.cluster_id.is_empty()
    }

    /// Wire representation used in commands.
    pub fn to_wire(&self) -> Namespace {
        Namespace {
            id: self.id.clone(),
            name: self.name.clone(),
            team_id: self.team_id.clone(),
            cluster_id: self.cluster_id.clone(),
            cluster_name: self.cluster_name.clone(),
            limits: self.limits,
        }
    }
}

/// App record.
#[derive(Debug, Clone, PartialEq)]
pub struct AppRecord {
    /// Unique identifier (`app-<uuid>`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning team.
    pub team_id: String,
    /// Creating user.
    pub creator: String,
    /// Namespace the app lives in.
    pub namespace_id: String,
    /// Installed chart.
    pub chart: ChartDetail,
    /// Target chart while an update is in flight.
    pub chart_updating: Option<ChartDetail>,
    /// Installed values overrides.
    pub custom_values: Vec<CustomValue>,
    /// Target values overrides while an update is in flight.
    pub custom_values_updating: Option<Vec<CustomValue>>,
    /// Lifecycle status.
    pub status: AppStatus,
    /// Cause of the last transition.
    pub event: AppEvent,
    /// Executor-supplied deployment detail.
    pub detail: String,
    /// Executor-supplied report text.
    pub report: String,
    /// Exposed node ports.
    pub node_ports: String,
    /// Gateway address in front of the app.
    pub gateway_addr: String,
    /// Hidden from listings.
    pub hidden: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub last_modified: DateTime<Utc>,
}

impl AppRecord {
    /// Public endpoint of the app on `cluster_id`.
    ///
    /// Only reported once the executor's detail text mentions the hostname,
    /// which is when the ingress actually exists.
    pub fn endpoint(&self, cluster_id: &str) -> Option<String> {
        if self.detail.is_empty() || cluster_id.is_empty() {
            return None;
        }
        let host = format!("{}.{}.{}", self.id, cluster_id, ENDPOINT_DOMAIN);
        self.detail.contains(&host).then_some(host)
    }

    /// Wire representation used in commands.
    pub fn to_deployment(&self, namespace: &NamespaceRecord) -> AppDeployment {
        AppDeployment {
            id: self.id.clone(),
            name: self.name.clone(),
            team_id: self.team_id.clone(),
            namespace: namespace.to_wire(),
            chart: self.chart.clone(),
            custom_values: self.custom_values.clone(),
        }
    }
}

/// Cluster connection record; the liveness proxy for a data center.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConnectionRecord {
    /// Data center id.
    pub id: String,
    /// Availability.
    pub status: ClusterStatus,
    /// Last heartbeat metrics.
    pub metrics: Option<HeartbeatMetrics>,
    /// When the connection was first seen.
    pub created_at: DateTime<Utc>,
    /// When the connection was last written.
    pub last_modified: DateTime<Utc>,
}

impl ClusterConnectionRecord {
    /// True if the data center is reachable.
    pub fn is_available(&self) -> bool {
        self.status == ClusterStatus::Available
    }
}

impl ManagedResource for NamespaceRecord {
    type Status = NamespaceStatus;

    fn id(&self) -> &str {
        &self.id
    }

    fn team_id(&self) -> &str {
        &self.team_id
    }

    fn status(&self) -> NamespaceStatus {
        self.status
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}

impl ManagedResource for AppRecord {
    type Status = AppStatus;

    fn id(&self) -> &str {
        &self.id
    }

    fn team_id(&self) -> &str {
        &self.team_id
    }

    fn status(&self) -> AppStatus {
        self.status
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Selection criteria for namespace listings.
#[derive(Debug, Clone, Default)]
pub struct NamespaceFilter {
    /// Only namespaces owned by this team.
    pub team_id: Option<String>,
    /// Only namespaces placed on this cluster.
    pub cluster_id: Option<String>,
    /// Only namespaces in one of these statuses.
    pub statuses: Option<Vec<NamespaceStatus>>,
    /// Include hidden records.
    pub include_hidden: bool,
}

impl NamespaceFilter {
    /// Namespaces owned by `team_id`.
    pub fn for_team(team_id: impl Into<String>) -> Self {
        Self {
            team_id: Some(team_id.into()),
            ..Default::default()
        }
    }

    /// Namespaces placed on `cluster_id`.
    pub fn on_cluster(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: Some(cluster_id.into()),
            ..Default::default()
        }
    }

    /// Restrict to `statuses`.
    pub fn with_statuses(mut self, statuses: impl Into<Vec<NamespaceStatus>>) -> Self {
        self.statuses = Some(statuses.into());
        self
    }

    /// Include hidden records.
    pub fn including_hidden(mut self) -> Self {
        self.include_hidden = true;
        self
    }

    /// True if `record` satisfies every criterion.
    pub fn matches(&self, record: &NamespaceRecord) -> bool {
        (self.include_hidden || !record.hidden)
            && self.team_id.as_ref().is_none_or(|t| *t == record.team_id)
            && self
                .cluster_id
                .as_ref()
                .is_none_or(|c| *c == record.cluster_id)
            && self
                .statuses
                .as_ref()
                .is_none_or(|s| s.contains(&record.status))
    }
}

/// Selection criteria for app listings and bulk updates.
#[derive(Debug, Clone, Default)]
pub struct AppFilter {
    /// Only apps owned by this team.
    pub team_id: Option<String>,
    /// Only apps inside this namespace.
    pub namespace_id: Option<String>,
    /// Only apps in one of these statuses.
    pub statuses: Option<Vec<AppStatus>>,
    /// Include hidden records.
    pub include_hidden: bool,
}

impl AppFilter {
    /// Apps owned by `team_id`.
    pub fn for_team(team_id: impl Into<String>) -> Self {
        Self {
            team_id: Some(team_id.into()),
            ..Default::default()
        }
    }

    /// Apps inside `namespace_id`.
    pub fn in_namespace(namespace_id: impl Into<String>) -> Self {
        Self {
            namespace_id: Some(namespace_id.into()),
            ..Default::default()
        }
    }

    /// Restrict to `statuses`.
    pub fn with_statuses(mut self, statuses: impl Into<Vec<AppStatus>>) -> Self {
        self.statuses = Some(statuses.into());
        self
    }

    /// Include hidden records.
    pub fn including_hidden(mut self) -> Self {
        self.include_hidden = true;
        self
    }

    /// True if `record` satisfies every criterion.
    pub fn matches(&self, record: &AppRecord) -> bool {
        (self.include_hidden || !record.hidden)
            && self.team_id.as_ref().is_none_or(|t| *t == record.team_id)
            && self
                .namespace_id
                .as_ref()
                .is_none_or(|n| *n == record.namespace_id)
            && self
                .statuses
                .as_ref()
                .is_none_or(|s| s.contains(&record.status))
    }
}

// ============================================================================
// Partial Updates
// ============================================================================

/// Update that can carry a lifecycle transition.
///
/// Lets kind-independent code (feedback guards, retention hiding) build
/// updates for either record kind.
pub trait LifecycleUpdate: Default + Send + 'static {
    /// Status enumeration the update writes.
    type Status: Lifecycle;

    /// Set status and event.
    fn with_status(self, status: Self::Status, event: <Self::Status as Lifecycle>::Event) -> Self;

    /// Set the hidden flag.
    fn with_hidden(self, hidden: bool) -> Self;
}

/// Field set for a partial namespace update. `None` leaves a field untouched.
///
/// Shadow fields use a nested `Option` so they can be cleared:
/// `Some(None)` resets them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New pending name.
    pub name_updating: Option<Option<String>>,
    /// New cluster assignment.
    pub cluster_id: Option<String>,
    /// New cluster display name.
    pub cluster_name: Option<String>,
    /// New limits.
    pub limits: Option<ResourceQuantity>,
    /// New pending limits.
    pub limits_updating: Option<Option<ResourceQuantity>>,
    /// New usage.
    pub usage: Option<ResourceQuantity>,
    /// New status.
    pub status: Option<NamespaceStatus>,
    /// New event.
    pub event: Option<NamespaceEvent>,
    /// New hidden flag.
    pub hidden: Option<bool>,
    /// Explicit modification time; defaults to now.
    pub last_modified: Option<DateTime<Utc>>,
}

impl NamespaceUpdate {
    /// Apply the field set to `record`, stamping `now` unless overridden.
    pub fn apply_to(self, record: &mut NamespaceRecord, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(name_updating) = self.name_updating {
            record.name_updating = name_updating;
        }
        if let Some(cluster_id) = self.cluster_id {
            record.cluster_id = cluster_id;
        }
        if let Some(cluster_name) = self.cluster_name {
            record.cluster_name = cluster_name;
        }
        if let Some(limits) = self.limits {
            record.limits = limits;
        }
        if let Some(limits_updating) = self.limits_updating {
            record.limits_updating = limits_updating;
        }
        if let Some(usage) = self.usage {
            record.usage = usage;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(event) = self.event {
            record.event = event;
        }
        if let Some(hidden) = self.hidden {
            record.hidden = hidden;
        }
        record.last_modified = self.last_modified.unwrap_or(now);
    }
}

impl LifecycleUpdate for NamespaceUpdate {
    type Status = NamespaceStatus;

    fn with_status(mut self, status: NamespaceStatus, event: NamespaceEvent) -> Self {
        self.status = Some(status);
        self.event = Some(event);
        self
    }

    fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }
}

/// Field set for a partial app update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New installed chart.
    pub chart: Option<ChartDetail>,
    /// New target chart.
    pub chart_updating: Option<Option<ChartDetail>>,
    /// New installed values.
    pub custom_values: Option<Vec<CustomValue>>,
    /// New target values.
    pub custom_values_updating: Option<Option<Vec<CustomValue>>>,
    /// New status.
    pub status: Option<AppStatus>,
    /// New event.
    pub event: Option<AppEvent>,
    /// New detail text.
    pub detail: Option<String>,
    /// New report text.
    pub report: Option<String>,
    /// New node ports.
    pub node_ports: Option<String>,
    /// New gateway address.
    pub gateway_addr: Option<String>,
    /// New hidden flag.
    pub hidden: Option<bool>,
    /// Explicit modification time; defaults to now.
    pub last_modified: Option<DateTime<Utc>>,
}

impl AppUpdate {
    /// Apply the field set to `record`, stamping `now` unless overridden.
    pub fn apply_to(self, record: &mut AppRecord, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(chart) = self.chart {
            record.chart = chart;
        }
        if let Some(chart_updating) = self.chart_updating {
            record.chart_updating = chart_updating;
        }
        if let Some(custom_values) = self.custom_values {
            record.custom_values = custom_values;
        }
        if let Some(custom_values_updating) = self.custom_values_updating {
            record.custom_values_updating = custom_values_updating;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(event) = self.event {
            record.event = event;
        }
        if let Some(detail) = self.detail {
            record.detail = detail;
        }
        if let Some(report) = self.report {
            record.report = report;
        }
        if let Some(node_ports) = self.node_ports {
            record.node_ports = node_ports;
        }
        if let Some(gateway_addr) = self.gateway_addr {
            record.gateway_addr = gateway_addr;
        }
        if let Some(hidden) = self.hidden {
            record.hidden = hidden;
        }
        record.last_modified = self.last_modified.unwrap_or(now);
    }
}

impl LifecycleUpdate for AppUpdate {
    type Status = AppStatus;

    fn with_status(mut self, status: AppStatus, event: AppEvent) -> Self {
        self.status = Some(status);
        self.event = Some(event);
        self
    }

    fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// State store used by the lifecycle manager, reconciler and heartbeat monitor.
///
/// Collections are keyed by id. No operation spans collections; callers that
/// need cross-record invariants read first and write with the guarded
/// `*_if` methods.
#[async_trait]
pub trait StateStore: Send + Sync {
    // ------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------

    /// Fetch a namespace by id.
    async fn get_namespace(&self, id: &str) -> Result<Option<NamespaceRecord>>;

    /// List namespaces matching `filter`, oldest first.
    async fn list_namespaces(&self, filter: &NamespaceFilter) -> Result<Vec<NamespaceRecord>>;

    /// Insert a new namespace. Fails with `RecordAlreadyExists` on duplicate id.
    async fn insert_namespace(&self, record: &NamespaceRecord) -> Result<()>;

    /// Unconditionally apply `update`. Fails with `RecordNotFound` if absent.
    async fn update_namespace(&self, id: &str, update: NamespaceUpdate) -> Result<()>;

    /// Apply `update` only while the stored status is one of `expected`.
    ///
    /// Returns true if the update was applied, false if the record is missing
    /// or its status did not match.
    async fn update_namespace_if(
        &self,
        id: &str,
        expected: &[NamespaceStatus],
        update: NamespaceUpdate,
    ) -> Result<bool>;

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    /// Fetch an app by id.
    async fn get_app(&self, id: &str) -> Result<Option<AppRecord>>;

    /// List apps matching `filter`, oldest first.
    async fn list_apps(&self, filter: &AppFilter) -> Result<Vec<AppRecord>>;

    /// Insert a new app. Fails with `RecordAlreadyExists` on duplicate id.
    async fn insert_app(&self, record: &AppRecord) -> Result<()>;

    /// Unconditionally apply `update`. Fails with `RecordNotFound` if absent.
    async fn update_app(&self, id: &str, update: AppUpdate) -> Result<()>;

    /// Apply `update` only while the stored status is one of `expected`.
    async fn update_app_if(
        &self,
        id: &str,
        expected: &[AppStatus],
        update: AppUpdate,
    ) -> Result<bool>;

    /// Apply `update` to every app matching `filter`; returns the change count.
    async fn update_apps_where(&self, filter: &AppFilter, update: AppUpdate) -> Result<u64>;

    // ------------------------------------------------------------------
    // Cluster connections
    // ------------------------------------------------------------------

    /// Fetch a cluster connection by data center id.
    async fn get_cluster(&self, id: &str) -> Result<Option<ClusterConnectionRecord>>;

    /// List every known cluster connection.
    async fn list_clusters(&self) -> Result<Vec<ClusterConnectionRecord>>;

    /// Create or update a cluster connection.
    ///
    /// `metrics = None` keeps previously stored metrics.
    async fn upsert_cluster(
        &self,
        id: &str,
        status: ClusterStatus,
        metrics: Option<HeartbeatMetrics>,
    ) -> Result<ClusterConnectionRecord>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn namespace(id: &str, team_id: &str, status: NamespaceStatus) -> NamespaceRecord {
        let now = Utc::now();
        NamespaceRecord {
            id: id.to_string(),
            name: format!("{}-name", id),
            name_updating: None,
            team_id: team_id.to_string(),
            creator: "user-1".to_string(),
            cluster_id: "dc-1".to_string(),
            cluster_name: "dc one".to_string(),
            limits: ResourceQuantity::new(1000, 2000, 50000),
            limits_updating: None,
            usage: ResourceQuantity::default(),
            status,
            event: NamespaceEvent::DispatchNs,
            hidden: false,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn app(id: &str, namespace_id: &str, team_id: &str, status: AppStatus) -> AppRecord {
        let now = Utc::now();
        AppRecord {
            id: id.to_string(),
            name: format!("{}-name", id),
            team_id: team_id.to_string(),
            creator: "user-1".to_string(),
            namespace_id: namespace_id.to_string(),
            chart: ChartDetail {
                repo: "stable".to_string(),
                name: "wordpress".to_string(),
                version: "5.6.2".to_string(),
                ..Default::default()
            },
            chart_updating: None,
            custom_values: Vec::new(),
            custom_values_updating: None,
            status,
            event: AppEvent::DispatchApp,
            detail: String::new(),
            report: String::new(),
            node_ports: String::new(),
            gateway_addr: String::new(),
            hidden: false,
            created_at: now,
            last_modified: now,
        }
    }
}
