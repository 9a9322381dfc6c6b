// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Listings, overview and counts.

use std::collections::{HashMap, HashSet};

use appmgr_core::store::{AppFilter, NamespaceFilter};
use appmgr_protocol::{AppStatus, NamespaceStatus, ResourceQuantity};
use chrono::Utc;
use tracing::debug;

use super::ControlHandlerState;
use crate::error::Result;
use crate::identity::RequestContext;
use crate::visibility::{AppView, ClusterReachability, NamespaceView, app_views};

// ============================================================================
// Listings
// ============================================================================

/// Handle a namespace listing for the caller's team.
pub async fn handle_namespace_list(
    state: &ControlHandlerState,
    ctx: &RequestContext,
) -> Result<Vec<NamespaceView>> {
    let records = state
        .store
        .list_namespaces(&NamespaceFilter::for_team(&ctx.team_id))
        .await?;
    let visible = state.visibility().apply(records, Utc::now()).await?;
    let reachability = ClusterReachability::load(state.store.as_ref()).await?;

    debug!(team_id = %ctx.team_id, count = visible.len(), "Listed namespaces");
    Ok(visible
        .into_iter()
        .map(|namespace| NamespaceView::new(namespace, &reachability))
        .collect())
}

/// Handle an app listing for the caller's team.
pub async fn handle_app_list(
    state: &ControlHandlerState,
    ctx: &RequestContext,
) -> Result<Vec<AppView>> {
    let records = state
        .store
        .list_apps(&AppFilter::for_team(&ctx.team_id))
        .await?;
    let visible = state.visibility().apply(records, Utc::now()).await?;

    let namespaces: HashMap<_, _> = state
        .store
        .list_namespaces(&NamespaceFilter::for_team(&ctx.team_id).including_hidden())
        .await?
        .into_iter()
        .map(|namespace| (namespace.id.clone(), namespace))
        .collect();
    let reachability = ClusterReachability::load(state.store.as_ref()).await?;

    debug!(team_id = %ctx.team_id, count = visible.len(), "Listed apps");
    Ok(app_views(visible, &namespaces, &reachability))
}

// ============================================================================
// Overview
// ============================================================================

/// Team dashboard summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppOverview {
    /// Clusters currently AVAILABLE.
    pub cluster_count: usize,
    /// Visible namespaces of the team.
    pub namespace_count: usize,
    /// Visible apps of the team.
    pub app_count: usize,
    /// Summed limits of RUNNING namespaces.
    pub limits: ResourceQuantity,
    /// Summed usage of RUNNING namespaces.
    pub usage: ResourceQuantity,
    /// Network endpoints reported by available clusters.
    pub endpoint_count: u64,
}

/// Handle an overview request for the caller's team.
pub async fn handle_app_overview(
    state: &ControlHandlerState,
    ctx: &RequestContext,
) -> Result<AppOverview> {
    let mut overview = AppOverview::default();

    for cluster in state.store.list_clusters().await? {
        if !cluster.is_available() {
            continue;
        }
        overview.cluster_count += 1;
        if let Some(metrics) = &cluster.metrics {
            overview.endpoint_count += metrics.endpoint_count;
        }
    }

    let namespaces = state
        .store
        .list_namespaces(&NamespaceFilter::for_team(&ctx.team_id))
        .await?;
    overview.namespace_count = namespaces.len();
    for namespace in namespaces
        .iter()
        .filter(|namespace| namespace.status == NamespaceStatus::Running)
    {
        overview.limits = overview.limits.saturating_add(namespace.limits);
        overview.usage = overview.usage.saturating_add(namespace.usage);
    }

    overview.app_count = state
        .store
        .list_apps(&AppFilter::for_team(&ctx.team_id))
        .await?
        .len();

    Ok(overview)
}

// ============================================================================
// Counts
// ============================================================================

/// Running resources of a team on one cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCount {
    /// RUNNING namespaces.
    pub namespaces: usize,
    /// RUNNING apps.
    pub apps: usize,
}

async fn running_apps_in(
    state: &ControlHandlerState,
    team_id: &str,
    namespace_ids: &HashSet<String>,
) -> Result<usize> {
    let apps = state
        .store
        .list_apps(&AppFilter::for_team(team_id).with_statuses([AppStatus::Running]))
        .await?;
    Ok(apps
        .iter()
        .filter(|app| namespace_ids.contains(&app.namespace_id))
        .count())
}

/// Handle an app count: RUNNING apps of `team_id` on `cluster_id`.
pub async fn handle_app_count(
    state: &ControlHandlerState,
    team_id: &str,
    cluster_id: &str,
) -> Result<usize> {
    let mut filter = NamespaceFilter::for_team(team_id);
    filter.cluster_id = Some(cluster_id.to_string());

    let namespace_ids: HashSet<String> = state
        .store
        .list_namespaces(&filter)
        .await?
        .into_iter()
        .map(|namespace| namespace.id)
        .collect();

    running_apps_in(state, team_id, &namespace_ids).await
}

/// Handle a namespace count: RUNNING namespaces of `team_id` on `cluster_id`
/// and the RUNNING apps inside them.
pub async fn handle_namespace_count(
    state: &ControlHandlerState,
    team_id: &str,
    cluster_id: &str,
) -> Result<ResourceCount> {
    let mut filter = NamespaceFilter::for_team(team_id).with_statuses([NamespaceStatus::Running]);
    filter.cluster_id = Some(cluster_id.to_string());

    let namespace_ids: HashSet<String> = state
        .store
        .list_namespaces(&filter)
        .await?
        .into_iter()
        .map(|namespace| namespace.id)
        .collect();

    Ok(ResourceCount {
        namespaces: namespace_ids.len(),
        apps: running_apps_in(state, team_id, &namespace_ids).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use appmgr_core::store::{NamespaceUpdate, StateStore};
    use appmgr_protocol::{AppEvent, ClusterStatus, HeartbeatMetrics, NamespaceEvent};

    #[tokio::test]
    async fn test_namespace_list_hides_expired_and_annotates() {
        let h = harness().await;
        h.store
            .insert_namespace(&namespace_record("ns-1", NamespaceStatus::Running))
            .await
            .unwrap();
        h.store
            .insert_namespace(&namespace_record("ns-2", NamespaceStatus::Canceled))
            .await
            .unwrap();
        h.store
            .update_namespace(
                "ns-2",
                NamespaceUpdate {
                    last_modified: Some(Utc::now() - chrono::Duration::seconds(7201)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let mut elsewhere = namespace_record("ns-3", NamespaceStatus::Running);
        elsewhere.cluster_id = "dc-down".to_string();
        h.store.insert_namespace(&elsewhere).await.unwrap();
        h.store
            .upsert_cluster("dc-down", ClusterStatus::Unavailable, None)
            .await
            .unwrap();

        let views = handle_namespace_list(&h.state, &ctx()).await.unwrap();
        let ids: Vec<_> = views.iter().map(|view| view.namespace.id.as_str()).collect();
        assert_eq!(ids, vec!["ns-1", "ns-3"]);
        assert_eq!(views[0].status, NamespaceStatus::Running);
        assert_eq!(views[1].status, NamespaceStatus::Unavailable);
        assert_eq!(views[1].event, NamespaceEvent::NsHeartbeatFailed);

        assert!(h.store.get_namespace("ns-2").await.unwrap().unwrap().hidden);
        let stored = h.store.get_namespace("ns-3").await.unwrap().unwrap();
        assert_eq!(stored.status, NamespaceStatus::Running);
    }

    #[tokio::test]
    async fn test_app_list_scoped_to_team() {
        let h = harness().await;
        h.store
            .insert_namespace(&namespace_record("ns-1", NamespaceStatus::Running))
            .await
            .unwrap();
        h.store
            .insert_app(&app_record("app-1", "ns-1", AppStatus::Running))
            .await
            .unwrap();
        let mut foreign = app_record("app-2", "ns-1", AppStatus::Running);
        foreign.team_id = "team-b".to_string();
        h.store.insert_app(&foreign).await.unwrap();

        let views = handle_app_list(&h.state, &ctx()).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].app.id, "app-1");
        assert_eq!(views[0].cluster_id, "dc-1");
        assert_eq!(views[0].event, AppEvent::LaunchAppSucceed);
    }

    #[tokio::test]
    async fn test_overview_and_counts() {
        let h = harness().await;
        h.store
            .upsert_cluster(
                "dc-1",
                ClusterStatus::Available,
                Some(HeartbeatMetrics {
                    endpoint_count: 3,
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        h.store
            .insert_namespace(&namespace_record("ns-1", NamespaceStatus::Running))
            .await
            .unwrap();
        h.store
            .insert_namespace(&namespace_record("ns-2", NamespaceStatus::Dispatching))
            .await
            .unwrap();
        h.store
            .insert_app(&app_record("app-1", "ns-1", AppStatus::Running))
            .await
            .unwrap();
        h.store
            .insert_app(&app_record("app-2", "ns-1", AppStatus::Failed))
            .await
            .unwrap();

        let overview = handle_app_overview(&h.state, &ctx()).await.unwrap();
        assert_eq!(overview.cluster_count, 1);
        assert_eq!(overview.namespace_count, 2);
        assert_eq!(overview.app_count, 2);
        assert_eq!(overview.limits, limits());
        assert_eq!(overview.endpoint_count, 3);

        assert_eq!(handle_app_count(&h.state, "team-a", "dc-1").await.unwrap(), 1);
        assert_eq!(handle_app_count(&h.state, "team-a", "dc-2").await.unwrap(), 0);
        assert_eq!(
            handle_namespace_count(&h.state, "team-a", "dc-1").await.unwrap(),
            ResourceCount {
                namespaces: 1,
                apps: 1
            }
        );
    }
}
