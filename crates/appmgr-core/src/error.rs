// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for appmgr-core.
//!
//! Provides a unified error type for state store operations with stable
//! machine-readable codes.

use appmgr_protocol::UnknownVariant;
use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by state store backends.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Record was not found.
    RecordNotFound {
        /// Record collection (namespace, app, cluster).
        kind: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// A record with the same id already exists.
    RecordAlreadyExists {
        /// Record collection (namespace, app, cluster).
        kind: &'static str,
        /// The duplicate id.
        id: String,
    },

    /// A stored value could not be interpreted.
    InvalidRecord {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::RecordNotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            kind,
            id: id.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::RecordAlreadyExists { .. } => "RECORD_ALREADY_EXISTS",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordNotFound { kind, id } => {
                write!(f, "{} '{}' not found", kind, id)
            }
            Self::RecordAlreadyExists { kind, id } => {
                write!(f, "{} '{}' already exists", kind, id)
            }
            Self::InvalidRecord { field, message } => {
                write!(f, "Invalid stored value for '{}': {}", field, message)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::DatabaseError {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<UnknownVariant> for CoreError {
    fn from(err: UnknownVariant) -> Self {
        CoreError::InvalidRecord {
            field: err.kind.to_string(),
            message: err.to_string(),
        }
    }
}
