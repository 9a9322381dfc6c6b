// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reports sent back by data centers.
//!
//! Three report kinds arrive on the feedback stream. They are modelled as a
//! closed enum so every consumer has to handle each of them explicitly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::command::OperationType;
use crate::model::{Namespace, ResourceQuantity};
use crate::status::{AppEvent, AppStatus, ClusterStatus, NamespaceEvent};

/// Outcome of an app command, or a detail refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppReport {
    /// App the report is about.
    pub app_id: String,
    /// Status as seen by the executor.
    pub status: AppStatus,
    /// What happened.
    pub event: AppEvent,
    /// Free-form deployment detail (rendered manifests, hostnames).
    #[serde(default)]
    pub detail: String,
    /// Free-form executor report (errors, warnings).
    #[serde(default)]
    pub report: String,
    /// Exposed node ports.
    #[serde(default)]
    pub node_ports: String,
    /// Gateway address in front of the app.
    #[serde(default)]
    pub gateway_addr: String,
}

/// Outcome of a namespace command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceReport {
    /// Namespace as seen by the executor; carries the assigned cluster.
    pub namespace: Namespace,
    /// What happened.
    pub event: NamespaceEvent,
    /// Free-form executor report.
    #[serde(default)]
    pub report: String,
}

/// Per-data-center metrics carried by heartbeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMetrics {
    /// Usage of every namespace the data center currently hosts, by namespace id.
    #[serde(default)]
    pub ns_used: HashMap<String, ResourceQuantity>,
    /// Number of network endpoints exposed by the data center.
    #[serde(default)]
    pub endpoint_count: u64,
}

/// Availability report for a whole data center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenterStatus {
    /// Data center (cluster) id.
    pub dc_id: String,
    /// Self-reported availability.
    pub dc_status: ClusterStatus,
    /// Metrics snapshot, when the report doubles as a heartbeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HeartbeatMetrics>,
}

/// Report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    /// App command outcome or detail refresh.
    App(AppReport),
    /// Namespace command outcome.
    Namespace(NamespaceReport),
    /// Data center availability.
    DataCenter(DataCenterStatus),
}

/// One message on the feedback stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    /// Operation the report answers. Absent for data center status reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_type: Option<OperationType>,
    /// The report itself.
    pub report: Feedback,
}

impl FeedbackMessage {
    /// Wrap an app report.
    pub fn app(op_type: OperationType, report: AppReport) -> Self {
        Self {
            op_type: Some(op_type),
            report: Feedback::App(report),
        }
    }

    /// Wrap a namespace report.
    pub fn namespace(op_type: OperationType, report: NamespaceReport) -> Self {
        Self {
            op_type: Some(op_type),
            report: Feedback::Namespace(report),
        }
    }

    /// Wrap a data center status report.
    pub fn data_center(status: DataCenterStatus) -> Self {
        Self {
            op_type: None,
            report: Feedback::DataCenter(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_report_defaults_optional_text() {
        let json = r#"{
            "op_type": "APP_CREATE",
            "report": {
                "app": {
                    "app_id": "app-1",
                    "status": "RUNNING",
                    "event": "LAUNCH_APP_SUCCEED"
                }
            }
        }"#;
        let message: FeedbackMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.op_type, Some(OperationType::AppCreate));
        match message.report {
            Feedback::App(report) => {
                assert_eq!(report.app_id, "app-1");
                assert_eq!(report.event, AppEvent::LaunchAppSucceed);
                assert!(report.detail.is_empty());
                assert!(report.gateway_addr.is_empty());
            }
            other => panic!("expected app report, got {:?}", other),
        }
    }

    #[test]
    fn test_data_center_status_without_op_type() {
        let json = r#"{
            "report": {
                "data_center": {
                    "dc_id": "dc-1",
                    "dc_status": "AVAILABLE",
                    "metrics": {
                        "ns_used": { "ns-1": { "cpu": 10, "mem": 20, "storage": 30 } },
                        "endpoint_count": 4
                    }
                }
            }
        }"#;
        let message: FeedbackMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.op_type, None);
        let Feedback::DataCenter(status) = message.report else {
            panic!("expected data center status");
        };
        let metrics = status.metrics.unwrap();
        assert_eq!(metrics.endpoint_count, 4);
        assert_eq!(metrics.ns_used["ns-1"], ResourceQuantity::new(10, 20, 30));
    }
}
