// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock dispatcher for testing.
//!
//! Records every published envelope; can be told to reject everything.

use appmgr_protocol::{CommandEnvelope, OperationType};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::traits::{CommandDispatcher, DispatchError};

/// Mock dispatcher for testing.
#[derive(Debug, Clone, Default)]
pub struct MockDispatcher {
    published: Arc<Mutex<Vec<CommandEnvelope>>>,
    fail: Arc<AtomicBool>,
}

impl MockDispatcher {
    /// Create a dispatcher that accepts every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher that rejects every command.
    pub fn failing() -> Self {
        let dispatcher = Self::default();
        dispatcher.set_failing(true);
        dispatcher
    }

    /// Switch rejection on or off.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All accepted envelopes, oldest first.
    pub async fn published(&self) -> Vec<CommandEnvelope> {
        self.published.lock().await.clone()
    }

    /// Operation types of all accepted envelopes.
    pub async fn published_ops(&self) -> Vec<OperationType> {
        self.published
            .lock()
            .await
            .iter()
            .map(|envelope| envelope.op_type)
            .collect()
    }
}

#[async_trait]
impl CommandDispatcher for MockDispatcher {
    async fn publish(&self, envelope: CommandEnvelope) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected(format!(
                "mock rejected {}",
                envelope.op_type
            )));
        }
        self.published.lock().await.push(envelope);
        Ok(())
    }
}
