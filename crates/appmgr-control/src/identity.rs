// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Caller identity attached to client operations.
//!
//! Identity is extracted upstream (gateway, auth middleware) and trusted
//! verbatim; ownership checks compare `team_id` only.

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated user, recorded as the creator of new records.
    pub user_id: String,
    /// Team the user acts for; owns every record the request creates.
    pub team_id: String,
}

impl RequestContext {
    /// Create a request context.
    pub fn new(user_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            team_id: team_id.into(),
        }
    }
}
