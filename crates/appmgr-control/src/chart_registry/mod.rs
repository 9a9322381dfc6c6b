// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Chart registry - resolves chart references during app create and update.

pub mod http;
pub mod mock;
mod traits;

pub use http::HttpChartRegistry;
pub use mock::MockChartRegistry;
pub use traits::*;
