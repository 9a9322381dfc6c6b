// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Namespace create, update and delete.

use appmgr_core::lifecycle::{ManagedResource, Phase, Signal};
use appmgr_core::store::{AppFilter, AppUpdate, LifecycleUpdate, NamespaceRecord, NamespaceUpdate};
use appmgr_protocol::{
    AppEvent, AppStatus, CommandEnvelope, NamespaceEvent, NamespaceStatus, OperationType,
    ResourceQuantity,
};
use chrono::Utc;
use tracing::{debug, info};

use super::{
    CancelPath, ControlHandlerState, cancel_locally, cancels_locally, ensure_not_canceled,
    load_owned, mark_canceling, require_cluster_available, require_phase,
    transition_or_conflict,
};
use crate::error::{Error, Result};
use crate::identity::RequestContext;

// ============================================================================
// Create
// ============================================================================

/// Request to create a namespace.
#[derive(Debug, Clone)]
pub struct CreateNamespaceRequest {
    /// Display name.
    pub name: String,
    /// Requested cpu/mem/storage; every component must be positive.
    pub limits: ResourceQuantity,
    /// Pin the namespace to a cluster; the scheduler picks one otherwise.
    pub cluster_id: Option<String>,
}

/// Response from namespace creation.
#[derive(Debug, Clone)]
pub struct CreateNamespaceResponse {
    /// Assigned namespace id.
    pub namespace_id: String,
}

pub(crate) fn validate_create_namespace(request: &CreateNamespaceRequest) -> Result<()> {
    if request.name.trim().is_empty() {
        return Err(Error::validation("namespace name is required"));
    }
    if !request.limits.is_positive() {
        return Err(Error::validation(
            "namespace cpu, mem and storage limits must be greater than zero",
        ));
    }
    Ok(())
}

/// Dispatch and persist a new namespace. Assumes the request is validated.
pub(crate) async fn launch_namespace(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    request: &CreateNamespaceRequest,
) -> Result<NamespaceRecord> {
    let cluster_id = request.cluster_id.clone().unwrap_or_default();
    if !cluster_id.is_empty() {
        require_cluster_available(state, &cluster_id).await?;
    }

    let now = Utc::now();
    let record = NamespaceRecord {
        id: format!("ns-{}", uuid::Uuid::new_v4()),
        name: request.name.clone(),
        name_updating: None,
        team_id: ctx.team_id.clone(),
        creator: ctx.user_id.clone(),
        cluster_id,
        cluster_name: String::new(),
        limits: request.limits,
        limits_updating: None,
        usage: ResourceQuantity::default(),
        status: NamespaceStatus::Dispatching,
        event: NamespaceEvent::DispatchNs,
        hidden: false,
        created_at: now,
        last_modified: now,
    };

    state
        .dispatcher
        .publish(CommandEnvelope::namespace(
            OperationType::NsCreate,
            record.to_wire(),
        ))
        .await?;
    state.store.insert_namespace(&record).await?;

    info!(
        namespace_id = %record.id,
        team_id = %record.team_id,
        cluster_id = %record.cluster_id,
        "Namespace dispatched"
    );
    Ok(record)
}

/// Handle namespace creation.
pub async fn handle_create_namespace(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    request: CreateNamespaceRequest,
) -> Result<CreateNamespaceResponse> {
    info!(team_id = %ctx.team_id, name = %request.name, "Create namespace request received");

    validate_create_namespace(&request)?;
    let record = launch_namespace(state, ctx, &request).await?;

    Ok(CreateNamespaceResponse {
        namespace_id: record.id,
    })
}

// ============================================================================
// Update
// ============================================================================

/// Request to rename or resize a namespace.
#[derive(Debug, Clone)]
pub struct UpdateNamespaceRequest {
    /// Namespace to update.
    pub namespace_id: String,
    /// New display name.
    pub name: Option<String>,
    /// New limits; every component must be positive.
    pub limits: Option<ResourceQuantity>,
}

/// Handle namespace update.
///
/// The new name and limits are held in the shadow fields until the executor
/// confirms the resize.
pub async fn handle_update_namespace(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    request: UpdateNamespaceRequest,
) -> Result<()> {
    info!(namespace_id = %request.namespace_id, "Update namespace request received");

    if request.name.is_none() && request.limits.is_none() {
        return Err(Error::validation("nothing to update"));
    }
    if request.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(Error::validation("namespace name must not be empty"));
    }
    if request.limits.is_some_and(|limits| !limits.is_positive()) {
        return Err(Error::validation(
            "namespace cpu, mem and storage limits must be greater than zero",
        ));
    }

    let namespace: NamespaceRecord = load_owned(state, ctx, &request.namespace_id).await?;
    require_phase(&namespace, Phase::UPDATABLE)?;
    require_cluster_available(state, &namespace.cluster_id).await?;

    let mut target = namespace.to_wire();
    if let Some(name) = &request.name {
        target.name = name.clone();
    }
    if let Some(limits) = request.limits {
        target.limits = limits;
    }

    state
        .dispatcher
        .publish(CommandEnvelope::namespace(OperationType::NsUpdate, target))
        .await?;

    transition_or_conflict::<NamespaceRecord>(
        state,
        &namespace.id,
        Phase::UPDATABLE,
        Phase::Updating,
        Signal::Update,
        NamespaceUpdate {
            name_updating: Some(request.name),
            limits_updating: Some(request.limits),
            ..Default::default()
        },
    )
    .await?;

    info!(namespace_id = %namespace.id, "Namespace update dispatched");
    Ok(())
}

// ============================================================================
// Delete
// ============================================================================

/// Handle namespace deletion.
///
/// FAILED and UNAVAILABLE namespaces are canceled locally and their apps
/// hidden. Otherwise every app must be inactive; UNAVAILABLE apps are
/// canceled along with the namespace since nothing will confirm them.
pub async fn handle_delete_namespace(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    namespace_id: &str,
) -> Result<CancelPath> {
    info!(namespace_id = %namespace_id, "Delete namespace request received");

    let namespace: NamespaceRecord = load_owned(state, ctx, namespace_id).await?;
    ensure_not_canceled(&namespace)?;

    if cancels_locally(&namespace) {
        cancel_locally(state, &namespace).await?;
        let hidden = state
            .store
            .update_apps_where(
                &AppFilter::in_namespace(namespace_id),
                AppUpdate::default().with_hidden(true),
            )
            .await?;
        debug!(namespace_id = %namespace_id, hidden, "Hid apps of canceled namespace");
        return Ok(CancelPath::Local);
    }

    let apps = state
        .store
        .list_apps(&AppFilter::in_namespace(namespace_id))
        .await?;
    let active = apps
        .iter()
        .filter(|app| !app.phase().is_in(Phase::INACTIVE) && app.status != AppStatus::Unavailable)
        .count();
    if active > 0 {
        return Err(Error::NamespaceHasActiveApps {
            namespace_id: namespace_id.to_string(),
            count: active,
        });
    }

    state
        .dispatcher
        .publish(CommandEnvelope::namespace(
            OperationType::NsCancel,
            namespace.to_wire(),
        ))
        .await?;

    let stranded = state
        .store
        .update_apps_where(
            &AppFilter::in_namespace(namespace_id).with_statuses([AppStatus::Unavailable]),
            AppUpdate::default().with_status(AppStatus::Canceled, AppEvent::CancelAppSucceed),
        )
        .await?;
    if stranded > 0 {
        info!(namespace_id = %namespace_id, apps = stranded, "Canceled unavailable apps with namespace");
    }

    mark_canceling(state, &namespace).await?;
    Ok(CancelPath::Dispatched)
}
