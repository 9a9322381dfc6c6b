// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command dispatcher - hands command envelopes to the message transport.

pub mod channel;
pub mod mock;
mod traits;

pub use channel::ChannelDispatcher;
pub use mock::MockDispatcher;
pub use traits::*;
