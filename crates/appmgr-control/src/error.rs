// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for appmgr-control.
//!
//! Every client-facing failure is raised before any persisted write, so
//! callers can retry any of them safely.

use appmgr_core::CoreError;
use appmgr_protocol::ResourceKind;
use thiserror::Error;

use crate::chart_registry::ChartRegistryError;
use crate::dispatcher::DispatchError;

/// Control plane errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// State store operation failed.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Request validation failed (missing name, zero limits, missing chart).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Record does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Record kind.
        kind: ResourceKind,
        /// Requested id.
        id: String,
    },

    /// Requesting team does not own the record.
    #[error("{kind} '{id}' is not owned by the requesting team")]
    NotOwner {
        /// Record kind.
        kind: ResourceKind,
        /// Requested id.
        id: String,
    },

    /// Referenced namespace belongs to another team.
    #[error("namespace '{0}' is not owned by the requesting team")]
    NamespaceNotOwned(String),

    /// Operation is not allowed in the record's current status.
    #[error("{kind} '{id}' does not support this operation while {status}")]
    NotSupported {
        /// Record kind.
        kind: ResourceKind,
        /// Requested id.
        id: String,
        /// Current status.
        status: String,
    },

    /// Record is already canceled.
    #[error("{kind} '{id}' is already canceled")]
    AlreadyCanceled {
        /// Record kind.
        kind: ResourceKind,
        /// Requested id.
        id: String,
    },

    /// App was already purged.
    #[error("app '{0}' is already purged")]
    AlreadyPurged(String),

    /// Namespace still hosts apps that are not canceled or failed.
    #[error("namespace '{namespace_id}' still has {count} active app(s)")]
    NamespaceHasActiveApps {
        /// Namespace id.
        namespace_id: String,
        /// Number of blocking apps.
        count: usize,
    },

    /// Target cluster is unknown or unavailable.
    #[error("cluster '{0}' is unavailable")]
    ClusterUnavailable(String),

    /// Chart does not exist in the registry.
    #[error("chart {0} not found")]
    ChartNotFound(String),

    /// Chart registry could not be reached or answered unexpectedly.
    #[error("chart registry unavailable: {0}")]
    ChartRegistryUnavailable(String),

    /// Command could not be handed to the transport.
    #[error("command dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl Error {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Core(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::NotOwner { .. } => "NOT_OWNER",
            Self::NamespaceNotOwned(_) => "NAMESPACE_NOT_OWNED",
            Self::NotSupported { .. } => "NOT_SUPPORTED",
            Self::AlreadyCanceled { .. } => "ALREADY_CANCELED",
            Self::AlreadyPurged(_) => "ALREADY_PURGED",
            Self::NamespaceHasActiveApps { .. } => "NAMESPACE_HAS_ACTIVE_APPS",
            Self::ClusterUnavailable(_) => "CLUSTER_UNAVAILABLE",
            Self::ChartNotFound(_) => "CHART_NOT_FOUND",
            Self::ChartRegistryUnavailable(_) => "CHART_REGISTRY_UNAVAILABLE",
            Self::Dispatch(_) => "DISPATCH_FAILED",
        }
    }

    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<ChartRegistryError> for Error {
    fn from(e: ChartRegistryError) -> Self {
        match e {
            ChartRegistryError::NotFound(chart) => Self::ChartNotFound(chart),
            other => Self::ChartRegistryUnavailable(other.to_string()),
        }
    }
}

/// Result type using control plane Error.
pub type Result<T> = std::result::Result<T, Error>;
