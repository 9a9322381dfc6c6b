// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! appmgr Control - Namespace and App Lifecycle Server
//!
//! Runs the control plane against PostgreSQL and bridges the executor
//! transports over stdio:
//! - stdout: one JSON-encoded command envelope per line
//! - stdin: one JSON-encoded feedback message per line

use std::sync::Arc;

use appmgr_control::config::Config;
use appmgr_control::dispatcher::ChannelDispatcher;
use appmgr_control::runtime::{ControlRuntime, connect_store};
use appmgr_control::telemetry;
use appmgr_protocol::{CommandEnvelope, FeedbackMessage, codec};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    telemetry::init_tracing();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        chart_registry = %config.chart_registry_url,
        heartbeat_staleness_secs = config.heartbeat_staleness.as_secs(),
        visibility_retention_secs = config.visibility_retention.as_secs(),
        "Starting appmgr control plane"
    );

    let store = connect_store(&config).await?;
    let (dispatcher, commands) = ChannelDispatcher::channel(config.channel_capacity);

    let runtime = ControlRuntime::builder()
        .store(store)
        .dispatcher(Arc::new(dispatcher))
        .config(config)
        .build()?
        .start()
        .await?;

    let writer = tokio::spawn(write_commands(commands));
    let feedback = runtime.feedback_sender();

    info!("Control plane ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
        _ = read_feedback(feedback) => info!("Feedback input closed"),
    }

    runtime.shutdown().await?;
    writer.abort();

    info!("appmgr control plane shut down");

    Ok(())
}

async fn write_commands(mut commands: mpsc::Receiver<CommandEnvelope>) {
    let mut stdout = tokio::io::stdout();
    while let Some(envelope) = commands.recv().await {
        let mut line = match codec::encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(op_type = %envelope.op_type, error = %e, "Failed to encode command");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = stdout.write_all(&line).await {
            error!(error = %e, "Failed to write command");
            return;
        }
        if let Err(e) = stdout.flush().await {
            error!(error = %e, "Failed to flush commands");
            return;
        }
    }
}

async fn read_feedback(feedback: mpsc::Sender<FeedbackMessage>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Failed to read feedback");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match codec::decode::<FeedbackMessage>(line.as_bytes()) {
            Ok(message) => {
                if feedback.send(message).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!(error = %e, "Skipping undecodable feedback line"),
        }
    }
}
