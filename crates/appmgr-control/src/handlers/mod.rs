// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client-facing lifecycle operations.
//!
//! Every mutating handler follows the same order: validate, check ownership
//! and status, check dependencies (cluster, chart registry), publish the
//! command, then write. Anything that fails before the publish leaves the
//! store untouched.

mod app;
mod namespace;
mod query;

pub use app::*;
pub use namespace::*;
pub use query::*;

use std::sync::Arc;

use appmgr_core::lifecycle::{Lifecycle, ManagedResource, Phase, Signal};
use appmgr_core::resource::{StoredResource, transition_if};
use appmgr_core::store::{LifecycleUpdate, StateStore};
use tracing::info;

use crate::chart_registry::ChartRegistry;
use crate::config::Config;
use crate::dispatcher::CommandDispatcher;
use crate::error::{Error, Result};
use crate::identity::RequestContext;
use crate::visibility::VisibilitySweep;

/// Shared state for lifecycle handlers.
pub struct ControlHandlerState {
    /// Record storage.
    pub store: Arc<dyn StateStore>,
    /// Command transport.
    pub dispatcher: Arc<dyn CommandDispatcher>,
    /// Chart lookups for app create and update.
    pub chart_registry: Arc<dyn ChartRegistry>,
    /// Control plane configuration.
    pub config: Config,
}

impl ControlHandlerState {
    /// Create handler state.
    pub fn new(
        store: Arc<dyn StateStore>,
        dispatcher: Arc<dyn CommandDispatcher>,
        chart_registry: Arc<dyn ChartRegistry>,
        config: Config,
    ) -> Self {
        Self {
            store,
            dispatcher,
            chart_registry,
            config,
        }
    }

    /// Visibility sweep configured with the retention window.
    pub fn visibility(&self) -> VisibilitySweep {
        VisibilitySweep::new(self.store.clone(), self.config.visibility_retention)
    }
}

// ============================================================================
// Shared Guards
// ============================================================================

/// Load a record the caller's team owns.
pub(crate) async fn load_owned<R: StoredResource>(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    id: &str,
) -> Result<R> {
    let record = R::load(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| Error::NotFound {
            kind: R::Status::KIND,
            id: id.to_string(),
        })?;

    if !record.is_owned_by(&ctx.team_id) {
        return Err(Error::NotOwner {
            kind: R::Status::KIND,
            id: id.to_string(),
        });
    }

    Ok(record)
}

/// Fail with `NotSupported` unless the record is in one of `allowed`.
pub(crate) fn require_phase<R: ManagedResource>(record: &R, allowed: &[Phase]) -> Result<()> {
    if record.phase().is_in(allowed) {
        Ok(())
    } else {
        Err(not_supported(record))
    }
}

pub(crate) fn not_supported<R: ManagedResource>(record: &R) -> Error {
    Error::NotSupported {
        kind: R::Status::KIND,
        id: record.id().to_string(),
        status: record.status().to_string(),
    }
}

/// Fail with `ClusterUnavailable` unless the cluster connection is AVAILABLE.
pub(crate) async fn require_cluster_available(
    state: &ControlHandlerState,
    cluster_id: &str,
) -> Result<()> {
    match state.store.get_cluster(cluster_id).await? {
        Some(cluster) if cluster.is_available() => Ok(()),
        _ => Err(Error::ClusterUnavailable(cluster_id.to_string())),
    }
}

/// Error for a guarded write that lost a race, based on the current status.
async fn conflict<R: StoredResource>(state: &ControlHandlerState, id: &str) -> Result<Error> {
    let current = R::load(state.store.as_ref(), id).await?;
    Ok(match current {
        None => Error::NotFound {
            kind: R::Status::KIND,
            id: id.to_string(),
        },
        Some(record) if record.phase().is_terminal() => Error::AlreadyCanceled {
            kind: R::Status::KIND,
            id: id.to_string(),
        },
        Some(record) => not_supported(&record),
    })
}

/// Guarded write for a client operation; a lost race becomes an error.
pub(crate) async fn transition_or_conflict<R: StoredResource>(
    state: &ControlHandlerState,
    id: &str,
    from: &[Phase],
    to: Phase,
    signal: Signal,
    extra: R::Update,
) -> Result<()> {
    if transition_if::<R>(state.store.as_ref(), id, from, to, signal, extra).await? {
        Ok(())
    } else {
        Err(conflict::<R>(state, id).await?)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// How a cancel request was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPath {
    /// No live executor; the record went straight to CANCELED and was hidden.
    Local,
    /// A cancel command was published; the record is CANCELING.
    Dispatched,
}

/// Reject cancellation of a record that is already CANCELED.
pub(crate) fn ensure_not_canceled<R: ManagedResource>(record: &R) -> Result<()> {
    if record.phase().is_terminal() {
        return Err(Error::AlreadyCanceled {
            kind: R::Status::KIND,
            id: record.id().to_string(),
        });
    }
    Ok(())
}

/// True if the record has no executor that could confirm a cancel.
pub(crate) fn cancels_locally<R: ManagedResource>(record: &R) -> bool {
    record.phase().is_in(Phase::CANCEL_WITHOUT_DISPATCH)
}

/// Complete a cancel without the executor: CANCELED and hidden.
pub(crate) async fn cancel_locally<R: StoredResource>(
    state: &ControlHandlerState,
    record: &R,
) -> Result<()> {
    transition_or_conflict::<R>(
        state,
        record.id(),
        Phase::CANCEL_WITHOUT_DISPATCH,
        Phase::Canceled,
        Signal::CancelSucceeded,
        R::Update::default().with_hidden(true),
    )
    .await?;

    info!(
        kind = %R::Status::KIND,
        id = %record.id(),
        from = %record.status(),
        "Canceled without dispatch"
    );
    Ok(())
}

/// Record a published cancel: CANCELING until the executor confirms.
pub(crate) async fn mark_canceling<R: StoredResource>(
    state: &ControlHandlerState,
    record: &R,
) -> Result<()> {
    transition_or_conflict::<R>(
        state,
        record.id(),
        Phase::CANCELABLE,
        Phase::Canceling,
        Signal::Cancel,
        R::Update::default(),
    )
    .await?;

    info!(kind = %R::Status::KIND, id = %record.id(), "Cancel dispatched");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::chart_registry::{ChartMetadata, ChartRef, MockChartRegistry};
    use crate::dispatcher::MockDispatcher;
    use appmgr_core::store::{AppRecord, InMemoryStore, NamespaceRecord};
    use appmgr_protocol::{
        AppEvent, AppStatus, ChartDetail, ClusterStatus, NamespaceEvent, NamespaceStatus,
        ResourceQuantity,
    };
    use chrono::Utc;

    pub struct Harness {
        pub store: Arc<InMemoryStore>,
        pub dispatcher: MockDispatcher,
        pub registry: MockChartRegistry,
        pub state: ControlHandlerState,
    }

    pub async fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = MockDispatcher::new();
        let registry = MockChartRegistry::new();
        registry
            .add_chart(
                ChartRef::new("stable", "wordpress", "5.6.2"),
                ChartMetadata {
                    app_version: "5.6.2".to_string(),
                    icon: "wordpress.png".to_string(),
                    description: "Web publishing".to_string(),
                },
            )
            .await;
        registry
            .add_chart(
                ChartRef::new("stable", "wordpress", "5.7.0"),
                ChartMetadata::default(),
            )
            .await;
        store
            .upsert_cluster("dc-1", ClusterStatus::Available, None)
            .await
            .unwrap();

        let state = ControlHandlerState::new(
            store.clone(),
            Arc::new(dispatcher.clone()),
            Arc::new(registry.clone()),
            Config::default(),
        );
        Harness {
            store,
            dispatcher,
            registry,
            state,
        }
    }

    pub fn ctx() -> RequestContext {
        RequestContext::new("user-1", "team-a")
    }

    pub fn limits() -> ResourceQuantity {
        ResourceQuantity::new(1000, 2000, 50000)
    }

    pub fn namespace_record(id: &str, status: NamespaceStatus) -> NamespaceRecord {
        let now = Utc::now();
        NamespaceRecord {
            id: id.to_string(),
            name: format!("{}-name", id),
            name_updating: None,
            team_id: "team-a".to_string(),
            creator: "user-1".to_string(),
            cluster_id: "dc-1".to_string(),
            cluster_name: "dc one".to_string(),
            limits: limits(),
            limits_updating: None,
            usage: ResourceQuantity::default(),
            status,
            event: NamespaceEvent::LaunchNsSucceed,
            hidden: false,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn app_record(id: &str, namespace_id: &str, status: AppStatus) -> AppRecord {
        let now = Utc::now();
        AppRecord {
            id: id.to_string(),
            name: format!("{}-name", id),
            team_id: "team-a".to_string(),
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
}
