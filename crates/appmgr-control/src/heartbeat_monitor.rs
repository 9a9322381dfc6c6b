// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Liveness tracking from periodic data-center heartbeats.
//!
//! Each heartbeat lists the namespaces a data center currently considers
//! alive, with their resource usage. Presence is evidence of life; absence is
//! only acted on once a namespace has been silent for longer than the
//! staleness threshold:
//!
//! - **Present**: RUNNING/FAILED/UNAVAILABLE namespaces go (back) to RUNNING
//!   with fresh usage, and their UNAVAILABLE/FAILED apps recover to RUNNING.
//! - **Absent and stale**: RUNNING namespaces on the cluster go UNAVAILABLE,
//!   and so do their RUNNING apps.
//!
//! UNAVAILABLE is a liveness inference, not a failure report; it has its own
//! recovery path and never comes from the feedback reconciler.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use appmgr_core::lifecycle::{Lifecycle, ManagedResource, Phase, Signal, window};
use appmgr_core::resource::transition_if;
use appmgr_core::store::{
    AppFilter, AppUpdate, LifecycleUpdate, NamespaceFilter, NamespaceRecord, NamespaceUpdate,
    StateStore,
};
use appmgr_protocol::{
    AppEvent, AppStatus, ClusterStatus, HeartbeatMetrics, NamespaceStatus, ResourceQuantity,
};
use chrono::Utc;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info};

use crate::config::{Config, ConfigError};
use crate::error::Result;

/// Configuration for the heartbeat monitor.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitorConfig {
    /// How long a RUNNING namespace may be missing from heartbeats before it
    /// is marked UNAVAILABLE.
    pub staleness_threshold: Duration,
}

impl Default for HeartbeatMonitorConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for HeartbeatMonitorConfig {
    fn from(config: &Config) -> Self {
        Self {
            staleness_threshold: config.heartbeat_staleness,
        }
    }
}

impl HeartbeatMonitorConfig {
    /// Load from `APPMGR_HEARTBEAT_STALENESS_SECS`.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Config::from_env().map(|config| Self::from(&config))
    }
}

/// One heartbeat from a data center.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    /// Reporting data center.
    pub cluster_id: String,
    /// Usage of every namespace it considers alive.
    pub metrics: HeartbeatMetrics,
}

/// What a heartbeat changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatSummary {
    /// Reported namespaces that were refreshed or revived.
    pub namespaces_seen: usize,
    /// Apps recovered to RUNNING.
    pub apps_recovered: u64,
    /// Silent namespaces marked UNAVAILABLE.
    pub namespaces_lost: usize,
    /// Apps marked UNAVAILABLE with their namespace.
    pub apps_lost: u64,
}

/// Applies heartbeats to namespace and app liveness.
pub struct HeartbeatMonitor {
    store: Arc<dyn StateStore>,
    config: HeartbeatMonitorConfig,
    shutdown: Arc<Notify>,
}

impl HeartbeatMonitor {
    /// Create a new heartbeat monitor.
    pub fn new(store: Arc<dyn StateStore>, config: HeartbeatMonitorConfig) -> Self {
        Self {
            store,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Consume heartbeats until shutdown or until the channel closes.
    pub async fn run(&self, mut heartbeats: mpsc::Receiver<Heartbeat>) {
        info!(
            staleness_secs = self.config.staleness_threshold.as_secs(),
            "Heartbeat monitor started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Heartbeat monitor received shutdown signal");
                    break;
                }

                heartbeat = heartbeats.recv() => {
                    let Some(heartbeat) = heartbeat else {
                        info!("Heartbeat channel closed");
                        break;
                    };
                    if let Err(e) = self.on_metrics(&heartbeat.cluster_id, heartbeat.metrics).await {
                        error!(
                            cluster_id = %heartbeat.cluster_id,
                            error = %e,
                            "Failed to apply heartbeat"
                        );
                    }
                }
            }
        }

        info!("Heartbeat monitor stopped");
    }

    /// Apply one heartbeat from `cluster_id`.
    pub async fn on_metrics(
        &self,
        cluster_id: &str,
        metrics: HeartbeatMetrics,
    ) -> Result<HeartbeatSummary> {
        let mut summary = HeartbeatSummary::default();

        self.store
            .upsert_cluster(cluster_id, ClusterStatus::Available, Some(metrics.clone()))
            .await?;

        for (namespace_id, usage) in &metrics.ns_used {
            let Some(namespace) = self.store.get_namespace(namespace_id).await? else {
                debug!(cluster_id, namespace_id = %namespace_id, "Heartbeat names unknown namespace");
                continue;
            };
            if self.mark_present(cluster_id, &namespace, *usage).await? {
                summary.namespaces_seen += 1;
                summary.apps_recovered += self.recover_apps(namespace_id).await?;
            }
        }

        let reported: HashSet<&str> = metrics.ns_used.keys().map(String::as_str).collect();
        let running = self
            .store
            .list_namespaces(
                &NamespaceFilter::on_cluster(cluster_id).with_statuses([NamespaceStatus::Running]),
            )
            .await?;
        let now = Utc::now();
        let staleness = window(self.config.staleness_threshold);

        for namespace in running {
            if reported.contains(namespace.id.as_str()) || !namespace.untouched_for(now, staleness) {
                continue;
            }
            let lost = transition_if::<NamespaceRecord>(
                self.store.as_ref(),
                &namespace.id,
                &[Phase::Running],
                Phase::Unavailable,
                Signal::HeartbeatFailed,
                NamespaceUpdate::default(),
            )
            .await?;
            if lost {
                let apps = self.degrade_apps(&namespace.id).await?;
                info!(
                    cluster_id,
                    namespace_id = %namespace.id,
                    apps,
                    "Namespace missing from heartbeats, marked unavailable"
                );
                summary.namespaces_lost += 1;
                summary.apps_lost += apps;
            }
        }

        debug!(cluster_id, ?summary, "Heartbeat applied");
        Ok(summary)
    }

    /// Refresh a reported namespace. Returns false if its status does not
    /// take heartbeats.
    async fn mark_present(
        &self,
        cluster_id: &str,
        namespace: &NamespaceRecord,
        usage: ResourceQuantity,
    ) -> Result<bool> {
        if !namespace.phase().is_in(Phase::HEARTBEAT_REVIVABLE) {
            debug!(
                namespace_id = %namespace.id,
                status = %namespace.status,
                "Ignoring heartbeat for namespace"
            );
            return Ok(false);
        }

        let mut update = NamespaceUpdate {
            usage: Some(usage),
            ..Default::default()
        };
        if namespace.cluster_id.is_empty() {
            update.cluster_id = Some(cluster_id.to_string());
        }
        if namespace.status != NamespaceStatus::Running {
            update = update.with_status(
                NamespaceStatus::Running,
                NamespaceStatus::event(Signal::HeartbeatRecovered),
            );
            info!(
                namespace_id = %namespace.id,
                from = %namespace.status,
                "Namespace back in heartbeats"
            );
        }

        let expected = NamespaceStatus::statuses(Phase::HEARTBEAT_REVIVABLE);
        Ok(self
            .store
            .update_namespace_if(&namespace.id, &expected, update)
            .await?)
    }

    async fn recover_apps(&self, namespace_id: &str) -> Result<u64> {
        Ok(self
            .store
            .update_apps_where(
                &AppFilter::in_namespace(namespace_id)
                    .with_statuses(AppStatus::statuses(Phase::HEARTBEAT_RECOVERABLE)),
                AppUpdate::default().with_status(AppStatus::Running, AppEvent::AppHeartbeatRecovered),
            )
            .await?)
    }

    async fn degrade_apps(&self, namespace_id: &str) -> Result<u64> {
        Ok(self
            .store
            .update_apps_where(
                &AppFilter::in_namespace(namespace_id).with_statuses([AppStatus::Running]),
                AppUpdate::default()
                    .with_status(AppStatus::Unavailable, AppEvent::AppHeartbeatFailed),
            )
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appmgr_core::store::{AppRecord, InMemoryStore};
    use appmgr_protocol::{ChartDetail, NamespaceEvent};
    use std::collections::HashMap;

    fn namespace(id: &str, status: NamespaceStatus, age_secs: i64) -> NamespaceRecord {
        let stamp = Utc::now() - chrono::Duration::seconds(age_secs);
        NamespaceRecord {
            id: id.to_string(),
            name: id.to_string(),
            name_updating: None,
            team_id: "team-a".to_string(),
            creator: "user-1".to_string(),
            cluster_id: "dc-1".to_string(),
            cluster_name: "dc one".to_string(),
            limits: ResourceQuantity::new(1000, 2000, 50000),
            limits_updating: None,
            usage: ResourceQuantity::default(),
            status,
            event: NamespaceEvent::LaunchNsSucceed,
            hidden: false,
            created_at: stamp,
            last_modified: stamp,
        }
    }

    fn app(id: &str, namespace_id: &str, status: AppStatus) -> AppRecord {
        let now = Utc::now();
        AppRecord {
            id: id.to_string(),
            name: id.to_string(),
            team_id: "team-a".to_string(),
            creator: "user-1".to_string(),
            namespace_id: namespace_id.to_string(),
            chart: ChartDetail::default(),
            chart_updating: None,
            custom_values: Vec::new(),
            custom_values_updating: None,
            status,
            event: AppEvent::LaunchAppSucceed,
            detail: String::new(),
            report: String::new(),
            node_ports: String::new(),
            gateway_addr: String::new(),
            hidden: false,
            created_at: now,
            last_modified: now,
        }
    }

    fn metrics(namespaces: &[&str]) -> HeartbeatMetrics {
        HeartbeatMetrics {
            ns_used: namespaces
                .iter()
                .map(|id| (id.to_string(), ResourceQuantity::new(100, 200, 300)))
                .collect::<HashMap<_, _>>(),
            endpoint_count: 0,
        }
    }

    #[test]
    fn test_default_config() {
        assert_eq!(
            HeartbeatMonitorConfig::default().staleness_threshold,
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn test_fresh_absence_is_tolerated() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_namespace(&namespace("ns-1", NamespaceStatus::Running, 10))
            .await
            .unwrap();
        let monitor = HeartbeatMonitor::new(store.clone(), HeartbeatMonitorConfig::default());

        let summary = monitor.on_metrics("dc-1", metrics(&[])).await.unwrap();
        assert_eq!(summary.namespaces_lost, 0);
        assert_eq!(
            store.get_namespace("ns-1").await.unwrap().unwrap().status,
            NamespaceStatus::Running
        );

        let cluster = store.get_cluster("dc-1").await.unwrap().unwrap();
        assert_eq!(cluster.status, ClusterStatus::Available);
    }

    #[tokio::test]
    async fn test_oversized_staleness_marks_nothing() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_namespace(&namespace("ns-1", NamespaceStatus::Running, 3600))
            .await
            .unwrap();

        for threshold in [10_000_000_000_000, u64::MAX] {
            let monitor = HeartbeatMonitor::new(
                store.clone(),
                HeartbeatMonitorConfig {
                    staleness_threshold: Duration::from_secs(threshold),
                },
            );
            let summary = monitor.on_metrics("dc-1", metrics(&[])).await.unwrap();
            assert_eq!(summary.namespaces_lost, 0);
        }
        assert_eq!(
            store.get_namespace("ns-1").await.unwrap().unwrap().status,
            NamespaceStatus::Running
        );
    }

    #[tokio::test]
    async fn test_present_namespace_gets_usage() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_namespace(&namespace("ns-1", NamespaceStatus::Running, 600))
            .await
            .unwrap();
        store
            .insert_namespace(&namespace("ns-2", NamespaceStatus::Canceled, 600))
            .await
            .unwrap();
        let monitor = HeartbeatMonitor::new(store.clone(), HeartbeatMonitorConfig::default());

        let summary = monitor
            .on_metrics("dc-1", metrics(&["ns-1", "ns-2", "ns-ghost"]))
            .await
            .unwrap();
        assert_eq!(summary.namespaces_seen, 1);

        let ns = store.get_namespace("ns-1").await.unwrap().unwrap();
        assert_eq!(ns.status, NamespaceStatus::Running);
        assert_eq!(ns.event, NamespaceEvent::LaunchNsSucceed);
        assert_eq!(ns.usage, ResourceQuantity::new(100, 200, 300));
        assert!(!ns.untouched_for(Utc::now(), chrono::Duration::seconds(60)));

        // Canceled namespaces never come back.
        assert_eq!(
            store.get_namespace("ns-2").await.unwrap().unwrap().status,
            NamespaceStatus::Canceled
        );
    }

    #[tokio::test]
    async fn test_staleness_round_trip() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_namespace(&namespace("ns-1", NamespaceStatus::Running, 61))
            .await
            .unwrap();
        store
            .insert_app(&app("app-1", "ns-1", AppStatus::Running))
            .await
            .unwrap();
        store
            .insert_app(&app("app-2", "ns-1", AppStatus::Canceling))
            .await
            .unwrap();
        let monitor = HeartbeatMonitor::new(store.clone(), HeartbeatMonitorConfig::default());

        let summary = monitor.on_metrics("dc-1", metrics(&[])).await.unwrap();
        assert_eq!(summary.namespaces_lost, 1);
        assert_eq!(summary.apps_lost, 1);

        let ns = store.get_namespace("ns-1").await.unwrap().unwrap();
        assert_eq!(ns.status, NamespaceStatus::Unavailable);
        assert_eq!(ns.event, NamespaceEvent::NsHeartbeatFailed);
        let lost = store.get_app("app-1").await.unwrap().unwrap();
        assert_eq!(lost.status, AppStatus::Unavailable);
        assert_eq!(lost.event, AppEvent::AppHeartbeatFailed);
        assert_eq!(
            store.get_app("app-2").await.unwrap().unwrap().status,
            AppStatus::Canceling
        );

        let summary = monitor.on_metrics("dc-1", metrics(&["ns-1"])).await.unwrap();
        assert_eq!(summary.namespaces_seen, 1);
        assert_eq!(summary.apps_recovered, 1);

        let ns = store.get_namespace("ns-1").await.unwrap().unwrap();
        assert_eq!(ns.status, NamespaceStatus::Running);
        assert_eq!(ns.event, NamespaceEvent::NsHeartbeatRecovered);
        let recovered = store.get_app("app-1").await.unwrap().unwrap();
        assert_eq!(recovered.status, AppStatus::Running);
        assert_eq!(recovered.event, AppEvent::AppHeartbeatRecovered);
    }

    #[tokio::test]
    async fn test_other_clusters_untouched() {
        let store = Arc::new(InMemoryStore::new());
        let mut elsewhere = namespace("ns-1", NamespaceStatus::Running, 600);
        elsewhere.cluster_id = "dc-2".to_string();
        store.insert_namespace(&elsewhere).await.unwrap();
        let monitor = HeartbeatMonitor::new(store.clone(), HeartbeatMonitorConfig::default());

        monitor.on_metrics("dc-1", metrics(&[])).await.unwrap();
        assert_eq!(
            store.get_namespace("ns-1").await.unwrap().unwrap().status,
            NamespaceStatus::Running
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        let monitor = Arc::new(HeartbeatMonitor::new(
            store.clone(),
            HeartbeatMonitorConfig::default(),
        ));
        let (tx, rx) = mpsc::channel(8);
        let shutdown = monitor.shutdown_handle();

        let worker = monitor.clone();
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tx.send(Heartbeat {
            cluster_id: "dc-9".to_string(),
            metrics: HeartbeatMetrics::default(),
        })
        .await
        .unwrap();

        for _ in 0..50 {
            if store.get_cluster("dc-9").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.get_cluster("dc-9").await.unwrap().is_some());

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
