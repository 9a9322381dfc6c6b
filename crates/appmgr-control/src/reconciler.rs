// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Feedback reconciler - applies executor reports to the state store.
//!
//! A report only moves a record if the record is still in the phase the
//! reported action expects (see [`Guard`]). Late, duplicate and reordered
//! reports therefore fall through as no-ops: a CREATE success that arrives
//! after the app was canceled leaves it canceled. The guard check and the
//! write happen in one compare-and-swap.

use std::sync::Arc;

use appmgr_core::lifecycle::{Guard, Lifecycle, Outcome, Phase, Signal};
use appmgr_core::resource::{StoredResource, transition_if};
use appmgr_core::store::{AppRecord, AppUpdate, NamespaceRecord, NamespaceUpdate, StateStore};
use appmgr_protocol::{
    Action, AppReport, AppStatus, ClusterStatus, DataCenterStatus, Feedback, FeedbackMessage,
    NamespaceReport, NamespaceStatus, OperationType, ResourceKind,
};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::heartbeat_monitor::HeartbeatMonitor;

/// What happened to one feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The report was written.
    Applied,
    /// The record exists but the report did not match its current phase,
    /// or reported nothing to change.
    Ignored,
    /// The report could not be matched to a record or an operation.
    Discarded,
}

/// Consumes feedback from data centers.
pub struct FeedbackReconciler {
    store: Arc<dyn StateStore>,
    heartbeat: Arc<HeartbeatMonitor>,
    shutdown: Arc<Notify>,
}

impl FeedbackReconciler {
    /// Create a reconciler. Data-center reports carrying metrics are handed
    /// to `heartbeat`.
    pub fn new(store: Arc<dyn StateStore>, heartbeat: Arc<HeartbeatMonitor>) -> Self {
        Self {
            store,
            heartbeat,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Consume feedback until shutdown or until the channel closes.
    ///
    /// A failing message is logged and skipped.
    pub async fn run(&self, mut feedback: mpsc::Receiver<FeedbackMessage>) {
        info!("Feedback reconciler started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Feedback reconciler received shutdown signal");
                    break;
                }

                message = feedback.recv() => {
                    let Some(message) = message else {
                        info!("Feedback channel closed");
                        break;
                    };
                    let op_type = message.op_type;
                    if let Err(e) = self.on_feedback(message).await {
                        error!(op_type = ?op_type, error = %e, "Failed to reconcile feedback");
                    }
                }
            }
        }

        info!("Feedback reconciler stopped");
    }

    /// Apply one feedback message.
    pub async fn on_feedback(&self, message: FeedbackMessage) -> Result<Reconciliation> {
        match message.report {
            Feedback::App(report) => {
                let Some(action) = action_for(message.op_type, ResourceKind::App) else {
                    warn!(app_id = %report.app_id, op_type = ?message.op_type, "App report without app operation discarded");
                    return Ok(Reconciliation::Discarded);
                };
                self.on_app_report(action, report).await
            }
            Feedback::Namespace(report) => {
                let Some(action) = action_for(message.op_type, ResourceKind::Namespace) else {
                    warn!(namespace_id = %report.namespace.id, op_type = ?message.op_type, "Namespace report without namespace operation discarded");
                    return Ok(Reconciliation::Discarded);
                };
                self.on_namespace_report(action, report).await
            }
            Feedback::DataCenter(status) => self.on_data_center(status).await,
        }
    }

    async fn on_app_report(&self, action: Action, report: AppReport) -> Result<Reconciliation> {
        if action == Action::Detail {
            if self.store.get_app(&report.app_id).await?.is_none() {
                warn!(app_id = %report.app_id, "Detail for unknown app discarded");
                return Ok(Reconciliation::Discarded);
            }
            let fields = report_fields(&report);
            if fields == AppUpdate::default() {
                debug!(app_id = %report.app_id, "Empty detail ignored");
                return Ok(Reconciliation::Ignored);
            }
            self.store.update_app(&report.app_id, fields).await?;
            debug!(app_id = %report.app_id, "App detail refreshed");
            return Ok(Reconciliation::Applied);
        }

        let outcome = app_outcome(&report);
        self.reconcile::<AppRecord, _>(&report.app_id, action, outcome, |app, outcome| {
            let mut update = report_fields(&report);
            if action == Action::Update {
                if outcome == Outcome::Succeeded {
                    update.chart = app.chart_updating.clone();
                    update.custom_values = app.custom_values_updating.clone();
                }
                update.chart_updating = Some(None);
                update.custom_values_updating = Some(None);
            }
            update
        })
        .await
    }

    async fn on_namespace_report(
        &self,
        action: Action,
        report: NamespaceReport,
    ) -> Result<Reconciliation> {
        let outcome = NamespaceStatus::signal(report.event).outcome();
        if !report.report.is_empty() {
            debug!(namespace_id = %report.namespace.id, report = %report.report, "Namespace report text");
        }

        let placed = &report.namespace;
        self.reconcile::<NamespaceRecord, _>(&placed.id, action, outcome, |namespace, outcome| {
            let mut update = NamespaceUpdate::default();
            match (action, outcome) {
                (Action::Create, Outcome::Succeeded) => {
                    if !placed.cluster_id.is_empty() {
                        update.cluster_id = Some(placed.cluster_id.clone());
                    }
                    if !placed.cluster_name.is_empty() {
                        update.cluster_name = Some(placed.cluster_name.clone());
                    }
                }
                (Action::Update, outcome) => {
                    if outcome == Outcome::Succeeded {
                        update.name = namespace.name_updating.clone();
                        update.limits = namespace.limits_updating;
                    }
                    update.name_updating = Some(None);
                    update.limits_updating = Some(None);
                }
                _ => {}
            }
            update
        })
        .await
    }

    async fn on_data_center(&self, status: DataCenterStatus) -> Result<Reconciliation> {
        match (status.dc_status, status.metrics) {
            (ClusterStatus::Available, Some(metrics)) => {
                self.heartbeat.on_metrics(&status.dc_id, metrics).await?;
            }
            (dc_status, metrics) => {
                self.store
                    .upsert_cluster(&status.dc_id, dc_status, metrics)
                    .await?;
                info!(cluster_id = %status.dc_id, status = %dc_status, "Cluster status updated");
            }
        }
        Ok(Reconciliation::Applied)
    }

    /// Apply the guard table for `action` to record `id`.
    ///
    /// `extra` builds the kind-specific fields written with the transition.
    async fn reconcile<R, F>(
        &self,
        id: &str,
        action: Action,
        outcome: Option<Outcome>,
        extra: F,
    ) -> Result<Reconciliation>
    where
        R: StoredResource,
        F: FnOnce(&R, Outcome) -> R::Update,
    {
        let kind = R::Status::KIND;
        let Some(record) = R::load(self.store.as_ref(), id).await? else {
            warn!(kind = %kind, id, "Feedback for unknown record discarded");
            return Ok(Reconciliation::Discarded);
        };

        let guard = Guard::for_action(action);
        if !guard.admits(record.phase()) {
            debug!(kind = %kind, id, status = %record.status(), ?action, "Stale feedback ignored");
            return Ok(Reconciliation::Ignored);
        }

        let Some(outcome) = outcome else {
            debug!(kind = %kind, id, ?action, "Feedback carries no outcome");
            return Ok(Reconciliation::Ignored);
        };
        let (Some(target), Some(signal)) = (guard.target(outcome), Signal::finished(action, outcome))
        else {
            warn!(kind = %kind, id, ?action, ?outcome, "Executor reported failure, status unchanged");
            return Ok(Reconciliation::Ignored);
        };

        let required = guard.required.unwrap_or(Phase::ALL);
        let update = extra(&record, outcome);
        if transition_if::<R>(self.store.as_ref(), id, required, target, signal, update).await? {
            info!(
                kind = %kind,
                id,
                from = %record.status(),
                to = %R::Status::from_phase(target),
                "Feedback applied"
            );
            Ok(Reconciliation::Applied)
        } else {
            debug!(kind = %kind, id, "Record moved before feedback could be applied");
            Ok(Reconciliation::Ignored)
        }
    }
}

fn action_for(op_type: Option<OperationType>, kind: ResourceKind) -> Option<Action> {
    op_type
        .filter(|op| op.kind() == kind)
        .map(|op| op.action())
}

/// Outcome of an app report: from its event, else from its status.
fn app_outcome(report: &AppReport) -> Option<Outcome> {
    AppStatus::signal(report.event).outcome().or(match report.status {
        AppStatus::Running | AppStatus::Canceled => Some(Outcome::Succeeded),
        AppStatus::Failed | AppStatus::UpdateFailed => Some(Outcome::Failed),
        _ => None,
    })
}

fn report_fields(report: &AppReport) -> AppUpdate {
    let non_empty = |value: &String| (!value.is_empty()).then(|| value.clone());
    AppUpdate {
        detail: non_empty(&report.detail),
        report: non_empty(&report.report),
        node_ports: non_empty(&report.node_ports),
        gateway_addr: non_empty(&report.gateway_addr),
        ..Default::default()
    }
}
