// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Visibility sweep for list operations.
//!
//! Two read-time passes run over every listing:
//!
//! 1. **Retention** - CANCELED/CANCELING records untouched for longer than the
//!    retention window are hidden. The hide is persisted (guarded on the
//!    record still being retired) and is one-way.
//! 2. **Reachability** - records whose cluster connection is missing or
//!    UNAVAILABLE are reported as UNAVAILABLE with the heartbeat-failed event.
//!    This annotation is never written back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use appmgr_core::lifecycle::{Lifecycle, Phase, Signal, window};
use appmgr_core::resource::{StoredResource, hide_if};
use appmgr_core::store::{AppRecord, NamespaceRecord, StateStore};
use appmgr_protocol::{AppEvent, AppStatus, NamespaceEvent, NamespaceStatus};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;

/// Retention pass over freshly listed records.
pub struct VisibilitySweep {
    store: Arc<dyn StateStore>,
    retention: chrono::Duration,
}

impl VisibilitySweep {
    /// Create a sweep hiding retired records older than `retention`.
    pub fn new(store: Arc<dyn StateStore>, retention: Duration) -> Self {
        Self {
            store,
            retention: window(retention),
        }
    }

    /// Drop hidden records and hide expired retired ones.
    ///
    /// Returns the records that remain visible, in input order.
    pub async fn apply<R: StoredResource>(
        &self,
        records: Vec<R>,
        now: DateTime<Utc>,
    ) -> Result<Vec<R>> {
        let mut visible = Vec::with_capacity(records.len());

        for record in records {
            if record.is_hidden() {
                continue;
            }

            if record.retention_expired(now, self.retention) {
                let hidden = hide_if::<R>(self.store.as_ref(), record.id(), Phase::RETIRED).await?;
                if hidden {
                    info!(
                        kind = %R::Status::KIND,
                        id = %record.id(),
                        status = %record.status(),
                        "Hid retired record past retention"
                    );
                    continue;
                }
                debug!(id = %record.id(), "Record left retirement before it could be hidden");
            }

            visible.push(record);
        }

        Ok(visible)
    }
}

/// Snapshot of which clusters are currently reachable.
#[derive(Debug, Clone, Default)]
pub struct ClusterReachability {
    available: HashSet<String>,
}

impl ClusterReachability {
    /// Read cluster connections from the store.
    pub async fn load(store: &dyn StateStore) -> Result<Self> {
        let available = store
            .list_clusters()
            .await?
            .into_iter()
            .filter(|cluster| cluster.is_available())
            .map(|cluster| cluster.id)
            .collect();
        Ok(Self { available })
    }

    /// True if `cluster_id` is AVAILABLE. Unassigned (empty) ids count as reachable.
    pub fn is_reachable(&self, cluster_id: &str) -> bool {
        cluster_id.is_empty() || self.available.contains(cluster_id)
    }

    /// Status and event to report for a record on `cluster_id`.
    pub fn annotate<S: Lifecycle>(&self, cluster_id: &str, status: S, event: S::Event) -> (S, S::Event) {
        if status.phase().is_terminal() || self.is_reachable(cluster_id) {
            (status, event)
        } else {
            (
                S::from_phase(Phase::Unavailable),
                S::event(Signal::HeartbeatFailed),
            )
        }
    }
}

/// Namespace as returned by listings.
#[derive(Debug, Clone)]
pub struct NamespaceView {
    /// Stored record.
    pub namespace: NamespaceRecord,
    /// Reported status, after reachability annotation.
    pub status: NamespaceStatus,
    /// Reported event, after reachability annotation.
    pub event: NamespaceEvent,
}

impl NamespaceView {
    /// Build the view for `namespace`.
    pub fn new(namespace: NamespaceRecord, reachability: &ClusterReachability) -> Self {
        let (status, event) =
            reachability.annotate(&namespace.cluster_id, namespace.status, namespace.event);
        Self {
            namespace,
            status,
            event,
        }
    }
}

/// App as returned by listings and detail.
#[derive(Debug, Clone)]
pub struct AppView {
    /// Stored record.
    pub app: AppRecord,
    /// Owning namespace name.
    pub namespace_name: String,
    /// Cluster the app runs on.
    pub cluster_id: String,
    /// Cluster display name.
    pub cluster_name: String,
    /// Reported status, after reachability annotation.
    pub status: AppStatus,
    /// Reported event, after reachability annotation.
    pub event: AppEvent,
    /// Public endpoint, once the executor has reported one.
    pub endpoint: Option<String>,
}

impl AppView {
    /// Build the view for `app`; `namespace` is its owning namespace if known.
    pub fn new(
        app: AppRecord,
        namespace: Option<&NamespaceRecord>,
        reachability: &ClusterReachability,
    ) -> Self {
        let (namespace_name, cluster_id, cluster_name) = namespace
            .map(|ns| (ns.name.clone(), ns.cluster_id.clone(), ns.cluster_name.clone()))
            .unwrap_or_default();
        let (status, event) = reachability.annotate(&cluster_id, app.status, app.event);
        let endpoint = app.endpoint(&cluster_id);

        Self {
            app,
            namespace_name,
            cluster_id,
            cluster_name,
            status,
            event,
            endpoint,
        }
    }
}

/// Build app views, resolving each app's namespace from `namespaces`.
pub fn app_views(
    apps: Vec<AppRecord>,
    namespaces: &HashMap<String, NamespaceRecord>,
    reachability: &ClusterReachability,
) -> Vec<AppView> {
    apps.into_iter()
        .map(|app| {
            let namespace = namespaces.get(&app.namespace_id);
            AppView::new(app, namespace, reachability)
        })
        .collect()
}
