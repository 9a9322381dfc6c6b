// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for appmgr-control.
//!
//! [`ControlRuntime`] wires the handler state to a state store, a command
//! dispatcher and a chart registry, and runs the two background consumers:
//! the feedback reconciler and the heartbeat monitor. Transports feed them
//! through [`ControlRuntime::feedback_sender`] and
//! [`ControlRuntime::heartbeat_sender`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use appmgr_control::config::Config;
//! use appmgr_control::dispatcher::ChannelDispatcher;
//! use appmgr_control::runtime::{ControlRuntime, connect_store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = connect_store(&config).await?;
//!     let (dispatcher, mut commands) = ChannelDispatcher::channel(config.channel_capacity);
//!
//!     let runtime = ControlRuntime::builder()
//!         .store(store)
//!         .dispatcher(Arc::new(dispatcher))
//!         .config(config)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // Forward `commands` to the executor, push reports into
//!     // `runtime.feedback_sender()`, serve requests with `runtime.state()`.
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use appmgr_core::migrations;
use appmgr_core::store::{PostgresStore, StateStore};
use appmgr_protocol::FeedbackMessage;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::chart_registry::ChartRegistry;
use crate::chart_registry::http::HttpChartRegistry;
use crate::config::Config;
use crate::dispatcher::CommandDispatcher;
use crate::handlers::ControlHandlerState;
use crate::heartbeat_monitor::{Heartbeat, HeartbeatMonitor, HeartbeatMonitorConfig};
use crate::reconciler::FeedbackReconciler;

/// Connect to PostgreSQL and run migrations.
pub async fn connect_store(config: &Config) -> Result<Arc<PostgresStore>> {
    let database_url = config.require_database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_limit)
        .connect(database_url)
        .await?;

    migrations::run_postgres(&pool).await?;
    info!(max_connections = config.db_pool_limit, "Database connected and migrated");

    Ok(Arc::new(PostgresStore::new(pool)))
}

/// Builder for creating a [`ControlRuntime`].
#[derive(Default)]
pub struct ControlRuntimeBuilder {
    store: Option<Arc<dyn StateStore>>,
    dispatcher: Option<Arc<dyn CommandDispatcher>>,
    chart_registry: Option<Arc<dyn ChartRegistry>>,
    config: Config,
}

impl ControlRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state store (required).
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the command dispatcher (required).
    pub fn dispatcher(mut self, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the chart registry.
    ///
    /// Default: an HTTP client for `config.chart_registry_url`.
    pub fn chart_registry(mut self, registry: Arc<dyn ChartRegistry>) -> Self {
        self.chart_registry = Some(registry);
        self
    }

    /// Set the configuration.
    ///
    /// Default: [`Config::default()`]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<ControlRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| anyhow::anyhow!("dispatcher is required"))?;
        if self.config.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be positive");
        }

        let chart_registry = match self.chart_registry {
            Some(registry) => registry,
            None => Arc::new(HttpChartRegistry::new(
                self.config.chart_registry_url.clone(),
                self.config.chart_registry_timeout,
            )?),
        };

        Ok(ControlRuntimeConfig {
            store,
            dispatcher,
            chart_registry,
            config: self.config,
        })
    }
}

/// Configuration for a [`ControlRuntime`].
pub struct ControlRuntimeConfig {
    store: Arc<dyn StateStore>,
    dispatcher: Arc<dyn CommandDispatcher>,
    chart_registry: Arc<dyn ChartRegistry>,
    config: Config,
}

impl ControlRuntimeConfig {
    /// Start the runtime, spawning the reconciler and heartbeat tasks.
    pub async fn start(self) -> Result<ControlRuntime> {
        let capacity = self.config.channel_capacity;

        let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
            self.store.clone(),
            HeartbeatMonitorConfig::from(&self.config),
        ));
        let heartbeat_shutdown = heartbeat_monitor.shutdown_handle();
        let (heartbeat_tx, heartbeat_rx) = mpsc::channel(capacity);

        let monitor = heartbeat_monitor.clone();
        let heartbeat_handle = tokio::spawn(async move {
            monitor.run(heartbeat_rx).await;
        });

        let reconciler = FeedbackReconciler::new(self.store.clone(), heartbeat_monitor);
        let reconciler_shutdown = reconciler.shutdown_handle();
        let (feedback_tx, feedback_rx) = mpsc::channel(capacity);

        let reconciler_handle = tokio::spawn(async move {
            reconciler.run(feedback_rx).await;
        });

        let state = Arc::new(ControlHandlerState::new(
            self.store,
            self.dispatcher,
            self.chart_registry,
            self.config,
        ));

        info!(
            channel_capacity = capacity,
            heartbeat_staleness_secs = state.config.heartbeat_staleness.as_secs(),
            visibility_retention_secs = state.config.visibility_retention.as_secs(),
            "ControlRuntime started"
        );

        Ok(ControlRuntime {
            reconciler_handle,
            heartbeat_handle,
            reconciler_shutdown,
            heartbeat_shutdown,
            feedback_tx,
            heartbeat_tx,
            state,
        })
    }
}

/// A running control plane that can be embedded in an application.
///
/// The runtime manages:
/// - Feedback reconciler applying executor reports
/// - Heartbeat monitor tracking namespace liveness
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct ControlRuntime {
    reconciler_handle: JoinHandle<()>,
    heartbeat_handle: JoinHandle<()>,
    reconciler_shutdown: Arc<Notify>,
    heartbeat_shutdown: Arc<Notify>,
    feedback_tx: mpsc::Sender<FeedbackMessage>,
    heartbeat_tx: mpsc::Sender<Heartbeat>,
    state: Arc<ControlHandlerState>,
}

impl ControlRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> ControlRuntimeBuilder {
        ControlRuntimeBuilder::new()
    }

    /// Get a reference to the shared handler state.
    pub fn state(&self) -> &Arc<ControlHandlerState> {
        &self.state
    }

    /// Sender for executor feedback.
    pub fn feedback_sender(&self) -> mpsc::Sender<FeedbackMessage> {
        self.feedback_tx.clone()
    }

    /// Sender for data-center heartbeats.
    pub fn heartbeat_sender(&self) -> mpsc::Sender<Heartbeat> {
        self.heartbeat_tx.clone()
    }

    /// Gracefully shut down the runtime.
    ///
    /// Signals the reconciler and heartbeat monitor to stop, then waits
    /// for them to complete. Messages still queued are dropped.
    pub async fn shutdown(self) -> Result<()> {
        info!("ControlRuntime shutting down...");

        self.reconciler_shutdown.notify_one();
        self.heartbeat_shutdown.notify_one();

        let mut panicked = false;

        if let Err(e) = self.reconciler_handle.await {
            error!("Feedback reconciler task panicked: {}", e);
            panicked = true;
        }

        if let Err(e) = self.heartbeat_handle.await {
            error!("Heartbeat monitor task panicked: {}", e);
            panicked = true;
        }

        if panicked {
            return Err(anyhow::anyhow!("background task panicked"));
        }

        info!("ControlRuntime shutdown complete");
        Ok(())
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.reconciler_handle.is_finished() && !self.heartbeat_handle.is_finished()
    }
}
