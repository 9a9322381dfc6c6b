// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for appmgr-control integration tests.
//!
//! Provides TestContext wiring handlers, reconciler and heartbeat monitor to
//! one in-memory store, plus helpers that play the executor's part.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use appmgr_control::chart_registry::{ChartMetadata, ChartRef, MockChartRegistry};
use appmgr_control::config::Config;
use appmgr_control::dispatcher::MockDispatcher;
use appmgr_control::handlers::{
    ControlHandlerState, CreateAppRequest, CreateNamespaceRequest, NamespaceTarget,
    handle_create_app, handle_create_namespace,
};
use appmgr_control::heartbeat_monitor::{HeartbeatMonitor, HeartbeatMonitorConfig};
use appmgr_control::reconciler::{FeedbackReconciler, Reconciliation};
use appmgr_control::RequestContext;
use appmgr_core::lifecycle::{Guard, Lifecycle, Outcome, Signal};
use appmgr_core::store::{
    AppRecord, AppUpdate, InMemoryStore, NamespaceRecord, NamespaceUpdate, StateStore,
};
use appmgr_protocol::{
    AppReport, AppStatus, ClusterStatus, CommandEnvelope, CommandPayload, FeedbackMessage,
    NamespaceReport, NamespaceStatus, ResourceQuantity,
};
use chrono::{DateTime, Utc};

pub const TEAM: &str = "team-a";
pub const CLUSTER: &str = "dc-1";

/// Test context sharing one store between every component.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub dispatcher: MockDispatcher,
    pub registry: MockChartRegistry,
    pub state: ControlHandlerState,
    pub heartbeat: Arc<HeartbeatMonitor>,
    pub reconciler: FeedbackReconciler,
}

impl TestContext {
    /// Create a context with default configuration.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Create a context with `config`; one available cluster and two
    /// wordpress chart versions are registered.
    pub async fn with_config(config: Config) -> Self {
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
                ChartMetadata {
                    app_version: "5.7.0".to_string(),
                    ..Default::default()
                },
            )
            .await;
        store
            .upsert_cluster(CLUSTER, ClusterStatus::Available, None)
            .await
            .expect("Failed to register cluster");

        let heartbeat = Arc::new(HeartbeatMonitor::new(
            store.clone(),
            HeartbeatMonitorConfig::from(&config),
        ));
        let reconciler = FeedbackReconciler::new(store.clone(), heartbeat.clone());
        let state = ControlHandlerState::new(
            store.clone(),
            Arc::new(dispatcher.clone()),
            Arc::new(registry.clone()),
            config,
        );

        Self {
            store,
            dispatcher,
            registry,
            state,
            heartbeat,
            reconciler,
        }
    }

    /// Most recently published command.
    pub async fn last_command(&self) -> CommandEnvelope {
        self.dispatcher
            .published()
            .await
            .pop()
            .expect("No command was published")
    }

    /// Report `outcome` for `envelope` the way an executor would.
    pub async fn report(&self, envelope: &CommandEnvelope, outcome: Outcome) -> Reconciliation {
        self.reconciler
            .on_feedback(feedback_for(envelope, outcome))
            .await
            .expect("Failed to reconcile feedback")
    }

    /// Report success for the most recently published command.
    pub async fn confirm_last(&self) -> Reconciliation {
        let envelope = self.last_command().await;
        self.report(&envelope, Outcome::Succeeded).await
    }

    /// Create a namespace on the test cluster and confirm it.
    pub async fn running_namespace(&self, name: &str) -> String {
        let response = handle_create_namespace(
            &self.state,
            &ctx(),
            CreateNamespaceRequest {
                name: name.to_string(),
                limits: limits(),
                cluster_id: Some(CLUSTER.to_string()),
            },
        )
        .await
        .expect("Failed to create namespace");
        assert_eq!(self.confirm_last().await, Reconciliation::Applied);
        response.namespace_id
    }

    /// Create an app in `namespace_id` and confirm it.
    pub async fn running_app(&self, namespace_id: &str, name: &str) -> String {
        let response = handle_create_app(
            &self.state,
            &ctx(),
            CreateAppRequest {
                name: name.to_string(),
                namespace: NamespaceTarget::Existing(namespace_id.to_string()),
                chart: ChartRef::new("stable", "wordpress", "5.6.2"),
                custom_values: Vec::new(),
            },
        )
        .await
        .expect("Failed to create app");
        assert_eq!(self.confirm_last().await, Reconciliation::Applied);
        response.app_id
    }

    pub async fn app(&self, id: &str) -> AppRecord {
        self.store
            .get_app(id)
            .await
            .expect("Failed to load app")
            .expect("App not found")
    }

    pub async fn namespace(&self, id: &str) -> NamespaceRecord {
        self.store
            .get_namespace(id)
            .await
            .expect("Failed to load namespace")
            .expect("Namespace not found")
    }

    /// Push a record's last_modified into the past.
    pub async fn age_app(&self, id: &str, age: Duration) {
        let update = AppUpdate {
            last_modified: Some(backdated(age)),
            ..Default::default()
        };
        self.store.update_app(id, update).await.expect("Failed to age app");
    }

    /// Push a record's last_modified into the past.
    pub async fn age_namespace(&self, id: &str, age: Duration) {
        let update = NamespaceUpdate {
            last_modified: Some(backdated(age)),
            ..Default::default()
        };
        self.store
            .update_namespace(id, update)
            .await
            .expect("Failed to age namespace");
    }
}

pub fn backdated(age: Duration) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::from_std(age).expect("age out of range")
}

pub fn ctx() -> RequestContext {
    RequestContext::new("user-1", TEAM)
}

pub fn other_team() -> RequestContext {
    RequestContext::new("user-2", "team-b")
}

pub fn limits() -> ResourceQuantity {
    ResourceQuantity::new(1000, 2000, 50000)
}

/// Executor feedback answering `envelope` with `outcome`.
pub fn feedback_for(envelope: &CommandEnvelope, outcome: Outcome) -> FeedbackMessage {
    let action = envelope.op_type.action();
    let signal = Signal::finished(action, outcome).unwrap_or(Signal::LaunchSucceeded);
    let target = Guard::for_action(action).target(outcome);

    match &envelope.payload {
        CommandPayload::Namespace(namespace) => {
            let mut namespace = namespace.clone();
            if namespace.cluster_id.is_empty() {
                namespace.cluster_id = CLUSTER.to_string();
            }
            namespace.cluster_name = format!("{} cluster", namespace.cluster_id);
            FeedbackMessage::namespace(
                envelope.op_type,
                NamespaceReport {
                    namespace,
                    event: NamespaceStatus::event(signal),
                    report: String::new(),
                },
            )
        }
        CommandPayload::App(deployment) => FeedbackMessage::app(
            envelope.op_type,
            AppReport {
                app_id: deployment.id.clone(),
                status: target
                    .map(AppStatus::from_phase)
                    .unwrap_or(AppStatus::Running),
                event: AppStatus::event(signal),
                detail: String::new(),
                report: String::new(),
                node_ports: "30080".to_string(),
                gateway_addr: String::new(),
            },
        ),
    }
}
