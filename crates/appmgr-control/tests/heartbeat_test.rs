// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for heartbeat-driven liveness: staleness, recovery and cluster
//! availability as seen by listings.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use appmgr_control::Error;
use appmgr_control::handlers::{
    CreateNamespaceRequest, handle_app_list, handle_cancel_app, handle_create_namespace,
    handle_delete_namespace, handle_namespace_list,
};
use appmgr_control::heartbeat_monitor::Heartbeat;
use appmgr_control::reconciler::Reconciliation;
use appmgr_protocol::{
    AppEvent, AppStatus, ClusterStatus, DataCenterStatus, FeedbackMessage, HeartbeatMetrics,
    NamespaceEvent, NamespaceStatus, ResourceQuantity,
};
use common::{CLUSTER, TestContext, ctx, limits};
use tokio::sync::mpsc;

fn metrics(namespaces: &[&str]) -> HeartbeatMetrics {
    HeartbeatMetrics {
        ns_used: namespaces
            .iter()
            .map(|id| (id.to_string(), ResourceQuantity::new(250, 512, 1024)))
            .collect::<HashMap<_, _>>(),
        endpoint_count: namespaces.len() as u64,
    }
}

async fn heartbeat(t: &TestContext, namespaces: &[&str]) {
    let result = t
        .reconciler
        .on_feedback(FeedbackMessage::data_center(DataCenterStatus {
            dc_id: CLUSTER.to_string(),
            dc_status: ClusterStatus::Available,
            metrics: Some(metrics(namespaces)),
        }))
        .await
        .unwrap();
    assert_eq!(result, Reconciliation::Applied);
}

#[tokio::test]
async fn test_staleness_round_trip() {
    let t = TestContext::new().await;
    let ns_id = t.running_namespace("dev").await;
    let app_id = t.running_app(&ns_id, "blog").await;

    // Recently touched: a missing namespace is tolerated.
    heartbeat(&t, &[]).await;
    assert_eq!(t.namespace(&ns_id).await.status, NamespaceStatus::Running);

    // Past the staleness window it is marked unavailable with its apps.
    t.age_namespace(&ns_id, Duration::from_secs(120)).await;
    heartbeat(&t, &[]).await;
    let namespace = t.namespace(&ns_id).await;
    assert_eq!(namespace.status, NamespaceStatus::Unavailable);
    assert_eq!(namespace.event, NamespaceEvent::NsHeartbeatFailed);
    let app = t.app(&app_id).await;
    assert_eq!(app.status, AppStatus::Unavailable);
    assert_eq!(app.event, AppEvent::AppHeartbeatFailed);

    // Reappearing restores both and records usage.
    heartbeat(&t, &[&ns_id]).await;
    let namespace = t.namespace(&ns_id).await;
    assert_eq!(namespace.status, NamespaceStatus::Running);
    assert_eq!(namespace.event, NamespaceEvent::NsHeartbeatRecovered);
    assert_eq!(namespace.usage, ResourceQuantity::new(250, 512, 1024));
    let app = t.app(&app_id).await;
    assert_eq!(app.status, AppStatus::Running);
    assert_eq!(app.event, AppEvent::AppHeartbeatRecovered);
}

#[tokio::test]
async fn test_unavailable_app_cancels_locally() {
    let t = TestContext::new().await;
    let ns_id = t.running_namespace("dev").await;
    let app_id = t.running_app(&ns_id, "blog").await;

    t.age_namespace(&ns_id, Duration::from_secs(120)).await;
    heartbeat(&t, &[]).await;
    assert_eq!(t.app(&app_id).await.status, AppStatus::Unavailable);

    let published = t.dispatcher.published().await.len();
    handle_cancel_app(&t.state, &ctx(), &app_id).await.unwrap();
    assert_eq!(t.app(&app_id).await.status, AppStatus::Canceled);
    assert_eq!(t.dispatcher.published().await.len(), published);

    // The namespace is unavailable too, so it goes the same way.
    handle_delete_namespace(&t.state, &ctx(), &ns_id)
        .await
        .unwrap();
    assert_eq!(t.namespace(&ns_id).await.status, NamespaceStatus::Canceled);
    assert_eq!(t.dispatcher.published().await.len(), published);
}

#[tokio::test]
async fn test_unavailable_cluster_annotates_listings() {
    let t = TestContext::new().await;
    let ns_id = t.running_namespace("dev").await;
    t.running_app(&ns_id, "blog").await;

    t.reconciler
        .on_feedback(FeedbackMessage::data_center(DataCenterStatus {
            dc_id: CLUSTER.to_string(),
            dc_status: ClusterStatus::Unavailable,
            metrics: None,
        }))
        .await
        .unwrap();

    let namespaces = handle_namespace_list(&t.state, &ctx()).await.unwrap();
    assert_eq!(namespaces[0].status, NamespaceStatus::Unavailable);
    assert_eq!(namespaces[0].event, NamespaceEvent::NsHeartbeatFailed);
    let apps = handle_app_list(&t.state, &ctx()).await.unwrap();
    assert_eq!(apps[0].status, AppStatus::Unavailable);

    // Stored status is untouched; only the view changes.
    assert_eq!(t.namespace(&ns_id).await.status, NamespaceStatus::Running);

    let err = handle_create_namespace(
        &t.state,
        &ctx(),
        CreateNamespaceRequest {
            name: "more".to_string(),
            limits: limits(),
            cluster_id: Some(CLUSTER.to_string()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::ClusterUnavailable(_)));
}

#[tokio::test]
async fn test_monitor_loop_consumes_heartbeats() {
    let t = TestContext::new().await;
    let ns_id = t.running_namespace("dev").await;
    t.age_namespace(&ns_id, Duration::from_secs(120)).await;

    let (tx, rx) = mpsc::channel(8);
    let monitor = t.heartbeat.clone();
    let handle = tokio::spawn(async move { monitor.run(rx).await });

    tx.send(Heartbeat {
        cluster_id: CLUSTER.to_string(),
        metrics: metrics(&[]),
    })
    .await
    .unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(
        t.namespace(&ns_id).await.status,
        NamespaceStatus::Unavailable
    );
}
