// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory implementation of the state store.
//!
//! Records live in `HashMap`s guarded by `tokio::sync::RwLock`. Intended for
//! tests and single-process embedding; nothing survives a restart.
//!
//! Compare-and-swap updates check the status and write under the same write
//! lock, so they are atomic with respect to every other writer in the process.

use std::collections::HashMap;
use std::sync::Arc;

use appmgr_protocol::{AppStatus, ClusterStatus, HeartbeatMetrics, NamespaceStatus};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    AppFilter, AppRecord, AppUpdate, ClusterConnectionRecord, NamespaceFilter, NamespaceRecord,
    NamespaceUpdate, StateStore,
};
use crate::error::{CoreError, Result};

/// State store backed by process memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    namespaces: Arc<RwLock<HashMap<String, NamespaceRecord>>>,
    apps: Arc<RwLock<HashMap<String, AppRecord>>>,
    clusters: Arc<RwLock<HashMap<String, ClusterConnectionRecord>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get_namespace(&self, id: &str) -> Result<Option<NamespaceRecord>> {
        Ok(self.namespaces.read().await.get(id).cloned())
    }

    async fn list_namespaces(&self, filter: &NamespaceFilter) -> Result<Vec<NamespaceRecord>> {
        let namespaces = self.namespaces.read().await;
        let mut records: Vec<NamespaceRecord> = namespaces
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn insert_namespace(&self, record: &NamespaceRecord) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.contains_key(&record.id) {
            return Err(CoreError::RecordAlreadyExists {
                kind: "namespace",
                id: record.id.clone(),
            });
        }
        namespaces.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_namespace(&self, id: &str, update: NamespaceUpdate) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let record = namespaces
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("namespace", id))?;
        update.apply_to(record, Utc::now());
        Ok(())
    }

    async fn update_namespace_if(
        &self,
        id: &str,
        expected: &[NamespaceStatus],
        update: NamespaceUpdate,
    ) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        match namespaces.get_mut(id) {
            Some(record) if expected.contains(&record.status) => {
                update.apply_to(record, Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_app(&self, id: &str) -> Result<Option<AppRecord>> {
        Ok(self.apps.read().await.get(id).cloned())
    }

    async fn list_apps(&self, filter: &AppFilter) -> Result<Vec<AppRecord>> {
        let apps = self.apps.read().await;
        let mut records: Vec<AppRecord> = apps
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn insert_app(&self, record: &AppRecord) -> Result<()> {
        let mut apps = self.apps.write().await;
        if apps.contains_key(&record.id) {
            return Err(CoreError::RecordAlreadyExists {
                kind: "app",
                id: record.id.clone(),
            });
        }
        apps.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_app(&self, id: &str, update: AppUpdate) -> Result<()> {
        let mut apps = self.apps.write().await;
        let record = apps
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("app", id))?;
        update.apply_to(record, Utc::now());
        Ok(())
    }

    async fn update_app_if(
        &self,
        id: &str,
        expected: &[AppStatus],
        update: AppUpdate,
    ) -> Result<bool> {
        let mut apps = self.apps.write().await;
        match apps.get_mut(id) {
            Some(record) if expected.contains(&record.status) => {
                update.apply_to(record, Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_apps_where(&self, filter: &AppFilter, update: AppUpdate) -> Result<u64> {
        let mut apps = self.apps.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for record in apps.values_mut().filter(|record| filter.matches(record)) {
            update.clone().apply_to(record, now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn get_cluster(&self, id: &str) -> Result<Option<ClusterConnectionRecord>> {
        Ok(self.clusters.read().await.get(id).cloned())
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterConnectionRecord>> {
        let clusters = self.clusters.read().await;
        let mut records: Vec<ClusterConnectionRecord> = clusters.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn upsert_cluster(
        &self,
        id: &str,
        status: ClusterStatus,
        metrics: Option<HeartbeatMetrics>,
    ) -> Result<ClusterConnectionRecord> {
        let mut clusters = self.clusters.write().await;
        let now = Utc::now();
        let record = clusters
            .entry(id.to_string())
            .or_insert_with(|| ClusterConnectionRecord {
                id: id.to_string(),
                status,
                metrics: None,
                created_at: now,
                last_modified: now,
            });
        record.status = status;
        if metrics.is_some() {
            record.metrics = metrics;
        }
        record.last_modified = now;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use appmgr_protocol::ResourceQuantity;

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = InMemoryStore::new();
        let ns = fixtures::namespace("ns-1", "team-a", NamespaceStatus::Dispatching);
        store.insert_namespace(&ns).await.unwrap();

        let err = store.insert_namespace(&ns).await.unwrap_err();
        assert_eq!(err.error_code(), "RECORD_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update_app("app-missing", AppUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RECORD_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_if_only_applies_on_expected_status() {
        let store = InMemoryStore::new();
        store
            .insert_app(&fixtures::app("app-1", "ns-1", "team-a", AppStatus::Canceled))
            .await
            .unwrap();

        let applied = store
            .update_app_if(
                "app-1",
                &[AppStatus::Dispatching, AppStatus::Launching],
                AppUpdate {
                    status: Some(AppStatus::Running),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!applied);
        let app = store.get_app("app-1").await.unwrap().unwrap();
        assert_eq!(app.status, AppStatus::Canceled);

        let applied = store
            .update_app_if(
                "app-1",
                &[AppStatus::Canceled],
                AppUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(applied);
        assert!(store.get_app("app-1").await.unwrap().unwrap().hidden);

        let missing = store
            .update_app_if("app-2", &[AppStatus::Canceled], AppUpdate::default())
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_update_apps_where_counts_changes() {
        let store = InMemoryStore::new();
        for (id, status) in [
            ("app-1", AppStatus::Running),
            ("app-2", AppStatus::Running),
            ("app-3", AppStatus::Failed),
        ] {
            store
                .insert_app(&fixtures::app(id, "ns-1", "team-a", status))
                .await
                .unwrap();
        }
        store
            .insert_app(&fixtures::app("app-4", "ns-2", "team-a", AppStatus::Running))
            .await
            .unwrap();

        let changed = store
            .update_apps_where(
                &AppFilter::in_namespace("ns-1").with_statuses([AppStatus::Running]),
                AppUpdate {
                    status: Some(AppStatus::Unavailable),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let unavailable = store
            .list_apps(&AppFilter::default().with_statuses([AppStatus::Unavailable]))
            .await
            .unwrap();
        let ids: Vec<_> = unavailable.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["app-1", "app-2"]);
    }

    #[tokio::test]
    async fn test_upsert_cluster_keeps_metrics_when_absent() {
        let store = InMemoryStore::new();
        let metrics = HeartbeatMetrics {
            ns_used: [("ns-1".to_string(), ResourceQuantity::new(1, 2, 3))].into(),
            endpoint_count: 2,
        };
        store
            .upsert_cluster("dc-1", ClusterStatus::Available, Some(metrics.clone()))
            .await
            .unwrap();
        let record = store
            .upsert_cluster("dc-1", ClusterStatus::Unavailable, None)
            .await
            .unwrap();

        assert_eq!(record.status, ClusterStatus::Unavailable);
        assert_eq!(record.metrics, Some(metrics));
        assert_eq!(store.list_clusters().await.unwrap().len(), 1);
    }
}
