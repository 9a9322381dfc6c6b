// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process dispatcher backed by a bounded tokio channel.
//!
//! The receiving half is handed to whatever bridges commands onto the real
//! transport (a broker publisher, an embedded executor, a test).

use appmgr_protocol::CommandEnvelope;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::traits::{CommandDispatcher, DispatchError};

/// Dispatcher that forwards envelopes into an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<CommandEnvelope>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiver for its commands.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CommandEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl CommandDispatcher for ChannelDispatcher {
    async fn publish(&self, envelope: CommandEnvelope) -> Result<(), DispatchError> {
        debug!(
            op_type = %envelope.op_type,
            resource_id = %envelope.resource_id(),
            "Publishing command"
        );
        self.tx
            .send(envelope)
            .await
            .map_err(|_| DispatchError::Closed)
    }
}
