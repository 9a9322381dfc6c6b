// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kind-generic access to namespaces and apps in a [`StateStore`].
//!
//! [`StoredResource`] lets feedback guards, cancellation fast paths and
//! retention hiding be written once and used for both record kinds.

use async_trait::async_trait;

use crate::error::Result;
use crate::lifecycle::{Lifecycle, ManagedResource, Phase, Signal};
use crate::store::{
    AppRecord, AppUpdate, LifecycleUpdate, NamespaceRecord, NamespaceUpdate, StateStore,
};

/// A record kind that can be loaded and conditionally updated.
#[async_trait]
pub trait StoredResource: ManagedResource {
    /// Partial update type for this kind.
    type Update: LifecycleUpdate<Status = Self::Status>;

    /// Load a record by id.
    async fn load(store: &dyn StateStore, id: &str) -> Result<Option<Self>>;

    /// Apply `update` unconditionally.
    async fn store_update(store: &dyn StateStore, id: &str, update: Self::Update) -> Result<()>;

    /// Apply `update` while the stored status is one of `expected`.
    async fn store_update_if(
        store: &dyn StateStore,
        id: &str,
        expected: &[Self::Status],
        update: Self::Update,
    ) -> Result<bool>;
}

#[async_trait]
impl StoredResource for NamespaceRecord {
    type Update = NamespaceUpdate;

    async fn load(store: &dyn StateStore, id: &str) -> Result<Option<Self>> {
        store.get_namespace(id).await
    }

    async fn store_update(store: &dyn StateStore, id: &str, update: NamespaceUpdate) -> Result<()> {
        store.update_namespace(id, update).await
    }

    async fn store_update_if(
        store: &dyn StateStore,
        id: &str,
        expected: &[Self::Status],
        update: NamespaceUpdate,
    ) -> Result<bool> {
        store.update_namespace_if(id, expected, update).await
    }
}

#[async_trait]
impl StoredResource for AppRecord {
    type Update = AppUpdate;

    async fn load(store: &dyn StateStore, id: &str) -> Result<Option<Self>> {
        store.get_app(id).await
    }

    async fn store_update(store: &dyn StateStore, id: &str, update: AppUpdate) -> Result<()> {
        store.update_app(id, update).await
    }

    async fn store_update_if(
        store: &dyn StateStore,
        id: &str,
        expected: &[Self::Status],
        update: AppUpdate,
    ) -> Result<bool> {
        store.update_app_if(id, expected, update).await
    }
}

/// Move a record to `to` if it is currently in one of `from`.
///
/// `extra` carries any kind-specific fields to write alongside the
/// transition. Returns whether the transition was applied.
pub async fn transition_if<R: StoredResource>(
    store: &dyn StateStore,
    id: &str,
    from: &[Phase],
    to: Phase,
    signal: Signal,
    extra: R::Update,
) -> Result<bool> {
    let expected = R::Status::statuses(from);
    let update = extra.with_status(R::Status::from_phase(to), R::Status::event(signal));
    R::store_update_if(store, id, &expected, update).await
}

/// Hide a record if it is still in one of `from`.
pub async fn hide_if<R: StoredResource>(
    store: &dyn StateStore,
    id: &str,
    from: &[Phase],
) -> Result<bool> {
    let expected = R::Status::statuses(from);
    R::store_update_if(store, id, &expected, R::Update::default().with_hidden(true)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, fixtures};
    use appmgr_protocol::{AppEvent, AppStatus, NamespaceEvent, NamespaceStatus};

    #[tokio::test]
    async fn test_transition_if_respects_guard() {
        let store = InMemoryStore::new();
        store
            .insert_app(&fixtures::app("app-1", "ns-1", "team-a", AppStatus::Canceled))
            .await
            .unwrap();

        let applied = transition_if::<AppRecord>(
            &store,
            "app-1",
            Phase::CREATE_IN_FLIGHT,
            Phase::Running,
            Signal::LaunchSucceeded,
            AppUpdate::default(),
        )
        .await
        .unwrap();

        assert!(!applied);
        let app = store.get_app("app-1").await.unwrap().unwrap();
        assert_eq!(app.status, AppStatus::Canceled);
        assert_eq!(app.event, AppEvent::DispatchApp);
    }

    #[tokio::test]
    async fn test_transition_if_writes_status_event_and_extra() {
        let store = InMemoryStore::new();
        store
            .insert_namespace(&fixtures::namespace(
                "ns-1",
                "team-a",
                NamespaceStatus::Dispatching,
            ))
            .await
            .unwrap();

        let applied = transition_if::<NamespaceRecord>(
            &store,
            "ns-1",
            Phase::CREATE_IN_FLIGHT,
            Phase::Running,
            Signal::LaunchSucceeded,
            NamespaceUpdate {
                cluster_id: Some("dc-9".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(applied);
        let ns = store.get_namespace("ns-1").await.unwrap().unwrap();
        assert_eq!(ns.status, NamespaceStatus::Running);
        assert_eq!(ns.event, NamespaceEvent::LaunchNsSucceed);
        assert_eq!(ns.cluster_id, "dc-9");
    }

    #[tokio::test]
    async fn test_hide_if() {
        let store = InMemoryStore::new();
        store
            .insert_app(&fixtures::app("app-1", "ns-1", "team-a", AppStatus::Running))
            .await
            .unwrap();

        assert!(!hide_if::<AppRecord>(&store, "app-1", Phase::RETIRED).await.unwrap());
        assert!(hide_if::<AppRecord>(&store, "app-1", &[Phase::Running]).await.unwrap());
        assert!(store.get_app("app-1").await.unwrap().unwrap().hidden);
    }
}
