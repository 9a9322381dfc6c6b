// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! App create, cancel, update, purge and detail.

use appmgr_core::lifecycle::{ManagedResource, Phase, Signal};
use appmgr_core::store::{AppRecord, AppUpdate, LifecycleUpdate, NamespaceRecord};
use appmgr_protocol::{
    AppEvent, AppStatus, ChartDetail, CommandEnvelope, CustomValue, OperationType, ResourceKind,
};
use chrono::Utc;
use tracing::{debug, info};

use super::namespace::{CreateNamespaceRequest, launch_namespace, validate_create_namespace};
use super::{
    CancelPath, ControlHandlerState, cancel_locally, cancels_locally, ensure_not_canceled,
    load_owned, mark_canceling, require_cluster_available, require_phase,
    transition_or_conflict,
};
use crate::chart_registry::ChartRef;
use crate::error::{Error, Result};
use crate::identity::RequestContext;
use crate::visibility::{AppView, ClusterReachability};

/// Prefix applied to custom value keys before they reach the executor.
pub const CUSTOM_VALUE_PREFIX: &str = "ankrCustomValues.";

fn prefixed(values: Vec<CustomValue>) -> Vec<CustomValue> {
    values
        .into_iter()
        .map(|value| {
            if value.key.starts_with(CUSTOM_VALUE_PREFIX) {
                value
            } else {
                CustomValue::new(format!("{}{}", CUSTOM_VALUE_PREFIX, value.key), value.value)
            }
        })
        .collect()
}

/// Check a chart exists and fill in its metadata.
async fn resolve_chart(
    state: &ControlHandlerState,
    team_id: &str,
    chart: &ChartRef,
) -> Result<ChartDetail> {
    if !state.chart_registry.exists(team_id, chart).await? {
        return Err(Error::ChartNotFound(chart.to_string()));
    }
    let metadata = state.chart_registry.fetch_metadata(team_id, chart).await?;
    Ok(chart.resolve(metadata))
}

async fn namespace_of(state: &ControlHandlerState, app: &AppRecord) -> Result<NamespaceRecord> {
    state
        .store
        .get_namespace(&app.namespace_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            kind: ResourceKind::Namespace,
            id: app.namespace_id.clone(),
        })
}

// ============================================================================
// Create
// ============================================================================

/// Where a new app should live.
#[derive(Debug, Clone)]
pub enum NamespaceTarget {
    /// An existing RUNNING namespace owned by the caller's team.
    Existing(String),
    /// A new namespace created together with the app.
    Inline(CreateNamespaceRequest),
}

enum Placement<'a> {
    Existing(NamespaceRecord),
    Inline(&'a CreateNamespaceRequest),
}

/// Request to create an app.
#[derive(Debug, Clone)]
pub struct CreateAppRequest {
    /// Display name.
    pub name: String,
    /// Target namespace.
    pub namespace: NamespaceTarget,
    /// Chart to deploy.
    pub chart: ChartRef,
    /// Chart value overrides.
    pub custom_values: Vec<CustomValue>,
}

/// Response from app creation.
#[derive(Debug, Clone)]
pub struct CreateAppResponse {
    /// Assigned app id.
    pub app_id: String,
    /// Namespace the app was placed in.
    pub namespace_id: String,
}

/// Handle app creation.
pub async fn handle_create_app(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    request: CreateAppRequest,
) -> Result<CreateAppResponse> {
    info!(
        team_id = %ctx.team_id,
        name = %request.name,
        chart = %request.chart,
        "Create app request received"
    );

    if request.name.trim().is_empty() {
        return Err(Error::validation("app name is required"));
    }
    if !request.chart.is_complete() {
        return Err(Error::validation("chart repo, name and version are required"));
    }

    let placement = match &request.namespace {
        NamespaceTarget::Existing(namespace_id) => {
            let namespace = state
                .store
                .get_namespace(namespace_id)
                .await?
                .ok_or_else(|| Error::NotFound {
                    kind: ResourceKind::Namespace,
                    id: namespace_id.clone(),
                })?;
            if !namespace.is_owned_by(&ctx.team_id) {
                return Err(Error::NamespaceNotOwned(namespace_id.clone()));
            }
            require_phase(&namespace, &[Phase::Running])?;
            require_cluster_available(state, &namespace.cluster_id).await?;
            Placement::Existing(namespace)
        }
        NamespaceTarget::Inline(namespace_request) => {
            validate_create_namespace(namespace_request)?;
            Placement::Inline(namespace_request)
        }
    };

    // Must precede the inline namespace launch.
    let chart = resolve_chart(state, &ctx.team_id, &request.chart).await?;

    let namespace = match placement {
        Placement::Existing(namespace) => namespace,
        Placement::Inline(namespace_request) => {
            launch_namespace(state, ctx, namespace_request).await?
        }
    };

    let now = Utc::now();
    let app = AppRecord {
        id: format!("app-{}", uuid::Uuid::new_v4()),
        name: request.name,
        team_id: ctx.team_id.clone(),
        creator: ctx.user_id.clone(),
        namespace_id: namespace.id.clone(),
        chart,
        chart_updating: None,
        custom_values: prefixed(request.custom_values),
        custom_values_updating: None,
        status: AppStatus::Dispatching,
        event: AppEvent::DispatchApp,
        detail: String::new(),
        report: String::new(),
        node_ports: String::new(),
        gateway_addr: String::new(),
        hidden: false,
        created_at: now,
        last_modified: now,
    };

    state
        .dispatcher
        .publish(CommandEnvelope::app(
            OperationType::AppCreate,
            app.to_deployment(&namespace),
        ))
        .await?;
    state.store.insert_app(&app).await?;

    info!(app_id = %app.id, namespace_id = %namespace.id, "App dispatched");
    Ok(CreateAppResponse {
        app_id: app.id,
        namespace_id: namespace.id,
    })
}

// ============================================================================
// Cancel
// ============================================================================

/// Handle app cancellation.
///
/// A second cancel of a CANCELED app fails with `AlreadyCanceled`.
pub async fn handle_cancel_app(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    app_id: &str,
) -> Result<CancelPath> {
    info!(app_id = %app_id, "Cancel app request received");

    let app: AppRecord = load_owned(state, ctx, app_id).await?;
    cancel_app(state, &app).await
}

async fn cancel_app(state: &ControlHandlerState, app: &AppRecord) -> Result<CancelPath> {
    ensure_not_canceled(app)?;

    if cancels_locally(app) {
        cancel_locally(state, app).await?;
        return Ok(CancelPath::Local);
    }

    let namespace = namespace_of(state, app).await?;
    state
        .dispatcher
        .publish(CommandEnvelope::app(
            OperationType::AppCancel,
            app.to_deployment(&namespace),
        ))
        .await?;
    mark_canceling(state, app).await?;
    Ok(CancelPath::Dispatched)
}

// ============================================================================
// Update
// ============================================================================

/// Request to rename an app or move it to another chart version.
#[derive(Debug, Clone, Default)]
pub struct UpdateAppRequest {
    /// App to update.
    pub app_id: String,
    /// New display name.
    pub name: Option<String>,
    /// New chart version in the same repo.
    pub chart_version: Option<String>,
    /// Replacement value overrides.
    pub custom_values: Option<Vec<CustomValue>>,
}

/// How an app update was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePath {
    /// Only the name changed; written directly.
    Renamed,
    /// A chart change was published; the app is UPDATING.
    Dispatched,
}

/// Handle app update.
pub async fn handle_update_app(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    request: UpdateAppRequest,
) -> Result<UpdatePath> {
    info!(app_id = %request.app_id, "Update app request received");

    if request.name.is_none() && request.chart_version.is_none() && request.custom_values.is_none()
    {
        return Err(Error::validation("nothing to update"));
    }
    if request.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(Error::validation("app name must not be empty"));
    }
    if request.chart_version.as_deref().is_some_and(str::is_empty) {
        return Err(Error::validation("chart version must not be empty"));
    }

    let app: AppRecord = load_owned(state, ctx, &request.app_id).await?;
    require_phase(&app, Phase::UPDATABLE)?;
    let namespace = namespace_of(state, &app).await?;
    require_cluster_available(state, &namespace.cluster_id).await?;

    let chart_changed = request
        .chart_version
        .as_deref()
        .is_some_and(|version| version != app.chart.version)
        || request.custom_values.is_some();

    if !chart_changed {
        state
            .store
            .update_app(
                &app.id,
                AppUpdate {
                    name: request.name,
                    ..Default::default()
                },
            )
            .await?;
        debug!(app_id = %app.id, "App renamed");
        return Ok(UpdatePath::Renamed);
    }

    let target = ChartRef::new(
        app.chart.repo.clone(),
        app.chart.name.clone(),
        request
            .chart_version
            .unwrap_or_else(|| app.chart.version.clone()),
    );
    let chart = resolve_chart(state, &ctx.team_id, &target).await?;
    let custom_values = request
        .custom_values
        .map(prefixed)
        .unwrap_or_else(|| app.custom_values.clone());

    let mut deployment = app.to_deployment(&namespace);
    deployment.chart = chart.clone();
    deployment.custom_values = custom_values.clone();
    if let Some(name) = &request.name {
        deployment.name = name.clone();
    }

    state
        .dispatcher
        .publish(CommandEnvelope::app(OperationType::AppUpdate, deployment))
        .await?;

    transition_or_conflict::<AppRecord>(
        state,
        &app.id,
        Phase::UPDATABLE,
        Phase::Updating,
        Signal::Update,
        AppUpdate {
            name: request.name,
            chart_updating: Some(Some(chart)),
            custom_values_updating: Some(Some(custom_values)),
            ..Default::default()
        },
    )
    .await?;

    info!(app_id = %app.id, chart = %target, "App update dispatched");
    Ok(UpdatePath::Dispatched)
}

// ============================================================================
// Purge
// ============================================================================

/// Handle app purge: cancel if needed, then hide.
pub async fn handle_purge_app(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    app_id: &str,
) -> Result<()> {
    info!(app_id = %app_id, "Purge app request received");

    let app: AppRecord = load_owned(state, ctx, app_id).await?;
    if app.hidden {
        return Err(Error::AlreadyPurged(app_id.to_string()));
    }
    if !app.phase().is_in(Phase::RETIRED) {
        cancel_app(state, &app).await?;
    }

    state
        .store
        .update_app(app_id, AppUpdate::default().with_hidden(true))
        .await?;
    info!(app_id = %app_id, "App purged");
    Ok(())
}

// ============================================================================
// Detail
// ============================================================================

/// Handle an app detail request.
///
/// Returns the current view and asks the executor for fresh detail text,
/// which arrives later as APP_DETAIL feedback. Retired apps are not asked.
pub async fn handle_app_detail(
    state: &ControlHandlerState,
    ctx: &RequestContext,
    app_id: &str,
) -> Result<AppView> {
    let app: AppRecord = load_owned(state, ctx, app_id).await?;
    if app.hidden {
        return Err(Error::AlreadyPurged(app_id.to_string()));
    }
    let namespace = namespace_of(state, &app).await?;

    if !app.phase().is_in(Phase::RETIRED) {
        state
            .dispatcher
            .publish(CommandEnvelope::app(
                OperationType::AppDetail,
                app.to_deployment(&namespace),
            ))
            .await?;
    }

    let reachability = ClusterReachability::load(state.store.as_ref()).await?;
    Ok(AppView::new(app, Some(&namespace), &reachability))
}
