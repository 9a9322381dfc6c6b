// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! appmgr Core - records, state store and lifecycle guards
//!
//! This crate holds everything about namespace and app state that does not
//! depend on how requests arrive:
//!
//! - [`lifecycle`]: the shared state machine and the feedback guard table
//! - [`store`]: record types and the [`store::StateStore`] contract, with
//!   in-memory and PostgreSQL backends
//! - [`resource`]: kind-generic store access used by guarded transitions
//!
//! # Consistency
//!
//! Each record is updated independently. Writers that depend on the current
//! status use compare-and-swap (`update_*_if`), which closes the window
//! between reading a status and writing a transition. Invariants spanning
//! records (a namespace with live apps cannot be deleted) are checked by
//! reading first; they are advisory.

#![deny(missing_docs)]

/// Error types for store operations.
pub mod error;

/// Shared namespace/app state machine.
pub mod lifecycle;

/// Embedded database migrations.
pub mod migrations;

/// Kind-generic access to stored resources.
pub mod resource;

/// Record types and state store backends.
pub mod store;

pub use error::{CoreError, Result};
