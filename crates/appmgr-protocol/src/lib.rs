// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! appmgr Protocol - messages exchanged with data-center executors
//!
//! This crate defines the payloads that travel between the appmgr control
//! plane and the remote executors that actually deploy workloads:
//! - Commands (control plane -> data center)
//! - Feedback reports and heartbeats (data center -> control plane)
//!
//! # Message Flow
//!
//! ```text
//! ┌──────────────────┐   CommandEnvelope    ┌──────────────────────┐
//! │  appmgr-control  │ ───────────────────► │   Data center        │
//! │                  │                      │   executor           │
//! │                  │ ◄─────────────────── │                      │
//! └──────────────────┘   FeedbackMessage    └──────────────────────┘
//!                        (App / Namespace /
//!                         DataCenter status)
//! ```
//!
//! All enumerations serialize as SCREAMING_SNAKE_CASE strings, which is also
//! the representation used for persisted status columns.
//!
//! The transport itself (broker, topics, delivery) is not part of this crate;
//! [`codec`] only turns messages into bytes and back.

pub mod codec;
pub mod command;
pub mod feedback;
pub mod model;
pub mod status;

pub use codec::{CodecError, decode, encode};
pub use command::{Action, AppDeployment, CommandEnvelope, CommandPayload, OperationType, ResourceKind};
pub use feedback::{AppReport, DataCenterStatus, Feedback, FeedbackMessage, HeartbeatMetrics, NamespaceReport};
pub use model::{ChartDetail, CustomValue, Namespace, ResourceQuantity};
pub use status::{AppEvent, AppStatus, ClusterStatus, NamespaceEvent, NamespaceStatus, UnknownVariant};
