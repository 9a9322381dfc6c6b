// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dispatcher trait definitions.

use appmgr_protocol::CommandEnvelope;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from publishing a command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// The transport is no longer accepting commands.
    #[error("Command transport closed")]
    Closed,

    /// The transport rejected the command.
    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// One-way publisher of commands to data centers.
///
/// A successful `publish` means the transport accepted the envelope; delivery
/// to the executor is neither guaranteed nor retried.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// Publish a command envelope.
    async fn publish(&self, envelope: CommandEnvelope) -> Result<(), DispatchError>;
}
