// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Status and event enumerations for namespaces, apps, and clusters.
//!
//! App and namespace statuses share the same shape: a record is dispatched,
//! runs, may be updated, and is eventually canceled. The event enumerations
//! record the cause of the most recent transition.

use thiserror::Error;

/// A string did not name any variant of a wire enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    /// Name of the enumeration that was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Declares a fieldless enum whose variants each carry a fixed wire string.
///
/// Generates serde renames, `as_str`, `Display`, `FromStr` and an `ALL` table.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire and storage representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::status::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok($name::$variant), )+
                    other => Err($crate::status::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Lifecycle status of an app.
    pub enum AppStatus {
        /// Create command published, no executor response yet.
        Dispatching => "DISPATCHING",
        /// Executor acknowledged the create and is deploying.
        Launching => "LAUNCHING",
        /// Deployed and reported healthy.
        Running => "RUNNING",
        /// Deployment failed.
        Failed => "FAILED",
        /// Update command published, awaiting the executor.
        Updating => "UPDATING",
        /// Last update failed; the previous release is still in place.
        UpdateFailed => "UPDATE_FAILED",
        /// Cancel command published, awaiting the executor.
        Canceling => "CANCELING",
        /// Torn down. Terminal.
        Canceled => "CANCELED",
        /// Owning namespace went silent on heartbeats.
        Unavailable => "UNAVAILABLE",
    }
}

wire_enum! {
    /// Lifecycle status of a namespace.
    pub enum NamespaceStatus {
        /// Create command published, no executor response yet.
        Dispatching => "DISPATCHING",
        /// Executor acknowledged the create and is provisioning.
        Launching => "LAUNCHING",
        /// Provisioned and present in heartbeats.
        Running => "RUNNING",
        /// Provisioning failed.
        Failed => "FAILED",
        /// Update command published, awaiting the executor.
        Updating => "UPDATING",
        /// Last update failed; previous limits are still in place.
        UpdateFailed => "UPDATE_FAILED",
        /// Cancel command published, awaiting the executor.
        Canceling => "CANCELING",
        /// Released. Terminal.
        Canceled => "CANCELED",
        /// Absent from heartbeats past the staleness threshold.
        Unavailable => "UNAVAILABLE",
    }
}

wire_enum! {
    /// Cause of the most recent app transition.
    pub enum AppEvent {
        /// Create command dispatched.
        DispatchApp => "DISPATCH_APP",
        /// Executor deployed the app.
        LaunchAppSucceed => "LAUNCH_APP_SUCCEED",
        /// Executor failed to deploy the app.
        LaunchAppFailed => "LAUNCH_APP_FAILED",
        /// Update command dispatched.
        UpdateApp => "UPDATE_APP",
        /// Executor applied the update.
        UpdateAppSucceed => "UPDATE_APP_SUCCEED",
        /// Executor failed to apply the update.
        UpdateAppFailed => "UPDATE_APP_FAILED",
        /// Cancel command dispatched.
        CancelApp => "CANCEL_APP",
        /// Executor removed the app.
        CancelAppSucceed => "CANCEL_APP_SUCCEED",
        /// Executor failed to remove the app.
        CancelAppFailed => "CANCEL_APP_FAILED",
        /// Owning namespace missed heartbeats.
        AppHeartbeatFailed => "APP_HEARTBEAT_FAILED",
        /// Owning namespace reappeared in a heartbeat.
        AppHeartbeatRecovered => "APP_HEARTBEAT_RECOVERED",
    }
}

wire_enum! {
    /// Cause of the most recent namespace transition.
    pub enum NamespaceEvent {
        /// Create command dispatched.
        DispatchNs => "DISPATCH_NS",
        /// Executor provisioned the namespace.
        LaunchNsSucceed => "LAUNCH_NS_SUCCEED",
        /// Executor failed to provision the namespace.
        LaunchNsFailed => "LAUNCH_NS_FAILED",
        /// Update command dispatched.
        UpdateNs => "UPDATE_NS",
        /// Executor applied the new limits.
        UpdateNsSucceed => "UPDATE_NS_SUCCEED",
        /// Executor failed to apply the new limits.
        UpdateNsFailed => "UPDATE_NS_FAILED",
        /// Cancel command dispatched.
        CancelNs => "CANCEL_NS",
        /// Executor released the namespace.
        CancelNsSucceed => "CANCEL_NS_SUCCEED",
        /// Executor failed to release the namespace.
        CancelNsFailed => "CANCEL_NS_FAILED",
        /// Missing from heartbeats past the staleness threshold.
        NsHeartbeatFailed => "NS_HEARTBEAT_FAILED",
        /// Reappeared in a heartbeat.
        NsHeartbeatRecovered => "NS_HEARTBEAT_RECOVERED",
    }
}

wire_enum! {
    /// Availability of a data center connection.
    pub enum ClusterStatus {
        /// Heartbeats are arriving.
        Available => "AVAILABLE",
        /// The data center reported itself down.
        Unavailable => "UNAVAILABLE",
    }
}
