// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! appmgr Control - Namespace and App Lifecycle Control Plane
//!
//! This crate accepts client lifecycle requests for namespaces and apps,
//! turns them into commands for data-center executors, and folds the
//! executors' asynchronous reports back into the state store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            API Gateway                                   │
//! │                 (RequestContext: user_id, team_id)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     appmgr-control (This Crate)                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │  Lifecycle  │  │  Feedback   │  │  Heartbeat  │  │ Visibility  │     │
//! │  │  Handlers   │  │ Reconciler  │  │   Monitor   │  │    Sweep    │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!        │      │               ▲                ▲
//!        │      │ Commands      │ Reports        │ Metrics
//!        │      ▼               │                │
//!        │  ┌──────────────────────────────────────────────┐
//!        │  │          Data-center executors               │
//!        │  └──────────────────────────────────────────────┘
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                     State Store (PostgreSQL / memory)                  │
//! │                 (Namespaces, Apps, Cluster connections)                │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Client Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `CreateNamespace` | Provision a namespace on a cluster |
//! | `UpdateNamespace` | Change a namespace's name or resource limits |
//! | `DeleteNamespace` | Release a namespace with no live apps |
//! | `CreateApp` | Deploy a chart, optionally into a new namespace |
//! | `UpdateApp` | Rename an app or upgrade its chart and values |
//! | `CancelApp` | Remove a deployed app |
//! | `PurgeApp` | Cancel if needed, then hide from listings |
//! | `AppDetail` | Read one app and ask its executor to refresh detail text |
//! | `NamespaceList` / `AppList` | Team listings with visibility rules applied |
//! | `AppOverview` / counts | Team usage summaries |
//!
//! Every mutating operation validates, checks ownership and status, checks
//! its dependencies, publishes its command, and only then writes.
//!
//! # Feedback
//!
//! Reports are applied through a guard table: a report only moves a record
//! that is still in the phase its action expects. Late and duplicate reports
//! are no-ops, so a canceled app is never resurrected.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `APPMGR_DATABASE_URL` | Yes* | - | PostgreSQL connection string |
//! | `APPMGR_DB_POOL_LIMIT` | No | `10` | Max pool connections |
//! | `APPMGR_CHART_REGISTRY_URL` | No | `http://chart-dev.dccn.ankr.com:8080` | Chart registry base URL |
//! | `APPMGR_CHART_REGISTRY_TIMEOUT_SECS` | No | `10` | Chart registry HTTP timeout |
//! | `APPMGR_HEARTBEAT_STALENESS_SECS` | No | `60` | Heartbeat staleness threshold |
//! | `APPMGR_VISIBILITY_RETENTION_SECS` | No | `7200` | Retention for canceled records |
//! | `APPMGR_CHANNEL_CAPACITY` | No | `1024` | Command and feedback buffer size |
//!
//! \* Only when running against PostgreSQL.
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for lifecycle operations
//! - [`handlers`]: Client lifecycle operations and queries
//! - [`dispatcher`]: Command transport abstraction
//! - [`chart_registry`]: Chart lookups
//! - [`reconciler`]: Executor feedback reconciliation
//! - [`heartbeat_monitor`]: Namespace liveness from heartbeats
//! - [`visibility`]: Listing filters and availability annotation
//! - [`runtime`]: Embeddable runtime

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for lifecycle operations.
pub mod error;

/// Caller identity supplied by the gateway.
pub mod identity;

/// Client lifecycle operations and queries.
pub mod handlers;

/// Command transport abstraction.
pub mod dispatcher;

/// Chart registry lookups (HTTP, mock).
pub mod chart_registry;

/// Executor feedback reconciliation.
pub mod reconciler;

/// Namespace liveness tracking from data-center heartbeats.
pub mod heartbeat_monitor;

/// Listing visibility and cluster availability annotation.
pub mod visibility;

/// Embeddable runtime for appmgr-control.
pub mod runtime;

/// Tracing subscriber setup.
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
pub use identity::RequestContext;
