// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Commands published to data centers.

use serde::{Deserialize, Serialize};

use crate::model::{ChartDetail, CustomValue, Namespace};
use crate::status::wire_enum;

wire_enum! {
    /// Operation carried by a command or echoed by a feedback report.
    pub enum OperationType {
        /// Provision a namespace.
        NsCreate => "NS_CREATE",
        /// Change namespace limits or name.
        NsUpdate => "NS_UPDATE",
        /// Release a namespace.
        NsCancel => "NS_CANCEL",
        /// Deploy an app.
        AppCreate => "APP_CREATE",
        /// Upgrade an app to a new chart version or values.
        AppUpdate => "APP_UPDATE",
        /// Remove an app.
        AppCancel => "APP_CANCEL",
        /// Ask the executor to refresh an app's detail text.
        AppDetail => "APP_DETAIL",
    }
}

/// The two kinds of managed resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A capacity slice on a cluster.
    Namespace,
    /// A workload inside a namespace.
    App,
}

impl ResourceKind {
    /// Lowercase name, used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::App => "app",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-independent part of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Provision or deploy.
    Create,
    /// Change a running resource.
    Update,
    /// Tear down.
    Cancel,
    /// Informational refresh; never changes status.
    Detail,
}

impl OperationType {
    /// Resource kind this operation targets.
    pub fn kind(&self) -> ResourceKind {
        match self {
            OperationType::NsCreate | OperationType::NsUpdate | OperationType::NsCancel => {
                ResourceKind::Namespace
            }
            OperationType::AppCreate
            | OperationType::AppUpdate
            | OperationType::AppCancel
            | OperationType::AppDetail => ResourceKind::App,
        }
    }

    /// Kind-independent action of this operation.
    pub fn action(&self) -> Action {
        match self {
            OperationType::NsCreate | OperationType::AppCreate => Action::Create,
            OperationType::NsUpdate | OperationType::AppUpdate => Action::Update,
            OperationType::NsCancel | OperationType::AppCancel => Action::Cancel,
            OperationType::AppDetail => Action::Detail,
        }
    }

    /// Compose an operation from kind and action.
    ///
    /// Returns `None` for combinations that do not exist (namespace detail).
    pub fn compose(kind: ResourceKind, action: Action) -> Option<Self> {
        match (kind, action) {
            (ResourceKind::Namespace, Action::Create) => Some(OperationType::NsCreate),
            (ResourceKind::Namespace, Action::Update) => Some(OperationType::NsUpdate),
            (ResourceKind::Namespace, Action::Cancel) => Some(OperationType::NsCancel),
            (ResourceKind::Namespace, Action::Detail) => None,
            (ResourceKind::App, Action::Create) => Some(OperationType::AppCreate),
            (ResourceKind::App, Action::Update) => Some(OperationType::AppUpdate),
            (ResourceKind::App, Action::Cancel) => Some(OperationType::AppCancel),
            (ResourceKind::App, Action::Detail) => Some(OperationType::AppDetail),
        }
    }
}

/// App deployment description sent with app commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDeployment {
    /// App id (`app-...`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning team.
    pub team_id: String,
    /// Namespace the app is deployed into.
    pub namespace: Namespace,
    /// Chart to install (for updates, the target chart).
    pub chart: ChartDetail,
    /// Values overrides, keys already prefixed for the executor.
    #[serde(default)]
    pub custom_values: Vec<CustomValue>,
}

/// Body of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPayload {
    /// Namespace commands.
    Namespace(Namespace),
    /// App commands.
    App(AppDeployment),
}

/// A command handed to the transport for delivery to a data center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// What the executor should do.
    pub op_type: OperationType,
    /// Resource the operation applies to.
    pub payload: CommandPayload,
}

impl CommandEnvelope {
    /// Build a namespace command.
    pub fn namespace(op_type: OperationType, namespace: Namespace) -> Self {
        Self {
            op_type,
            payload: CommandPayload::Namespace(namespace),
        }
    }

    /// Build an app command.
    pub fn app(op_type: OperationType, deployment: AppDeployment) -> Self {
        Self {
            op_type,
            payload: CommandPayload::App(deployment),
        }
    }

    /// Namespace payload, if this is a namespace command.
    pub fn as_namespace(&self) -> Option<&Namespace> {
        match &self.payload {
            CommandPayload::Namespace(ns) => Some(ns),
            CommandPayload::App(_) => None,
        }
    }

    /// Deployment payload, if this is an app command.
    pub fn as_app(&self) -> Option<&AppDeployment> {
        match &self.payload {
            CommandPayload::App(app) => Some(app),
            CommandPayload::Namespace(_) => None,
        }
    }

    /// Id of the resource this command targets.
    pub fn resource_id(&self) -> &str {
        match &self.payload {
            CommandPayload::Namespace(ns) => &ns.id,
            CommandPayload::App(app) => &app.id,
        }
    }

    /// Cluster the command should be routed to, if the namespace is placed.
    pub fn cluster_id(&self) -> Option<&str> {
        let cluster_id = match &self.payload {
            CommandPayload::Namespace(ns) => &ns.cluster_id,
            CommandPayload::App(app) => &app.namespace.cluster_id,
        };
        (!cluster_id.is_empty()).then_some(cluster_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceQuantity;

    #[test]
    fn test_operation_compose_matches_kind_and_action() {
        for op in OperationType::ALL {
            assert_eq!(OperationType::compose(op.kind(), op.action()), Some(*op));
        }
        assert_eq!(
            OperationType::compose(ResourceKind::Namespace, Action::Detail),
            None
        );
    }

    #[test]
    fn test_envelope_routing_helpers() {
        let ns = Namespace {
            id: "ns-1".to_string(),
            name: "web".to_string(),
            team_id: "team-a".to_string(),
            cluster_id: String::new(),
            cluster_name: String::new(),
            limits: ResourceQuantity::new(1000, 2000, 50000),
        };
        let envelope = CommandEnvelope::namespace(OperationType::NsCreate, ns.clone());
        assert_eq!(envelope.resource_id(), "ns-1");
        assert_eq!(envelope.cluster_id(), None);

        let placed = Namespace {
            cluster_id: "dc-1".to_string(),
            ..ns
        };
        let envelope = CommandEnvelope::namespace(OperationType::NsCancel, placed);
        assert_eq!(envelope.cluster_id(), Some("dc-1"));
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = CommandEnvelope::namespace(
            OperationType::NsCreate,
            Namespace {
                id: "ns-1".to_string(),
                name: "web".to_string(),
                team_id: "team-a".to_string(),
                cluster_id: String::new(),
                cluster_name: String::new(),
                limits: ResourceQuantity::new(1, 2, 3),
            },
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["op_type"], "NS_CREATE");
        assert_eq!(value["payload"]["namespace"]["id"], "ns-1");
        assert_eq!(value["payload"]["namespace"]["limits"]["storage"], 3);
    }
}
