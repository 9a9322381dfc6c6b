// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kind-independent lifecycle model shared by namespaces and apps.
//!
//! App and namespace statuses have the same shape, so the state machine is
//! expressed once over [`Phase`] and each status enum maps onto it through the
//! [`Lifecycle`] trait. The guard table for executor feedback lives here too:
//!
//! | Action | Required phase            | Success   | Failure        |
//! |--------|---------------------------|-----------|----------------|
//! | Create | Dispatching, Launching    | Running   | Failed         |
//! | Update | Updating                  | Running   | UpdateFailed   |
//! | Cancel | Canceling                 | Canceled  | (unchanged)    |
//! | Detail | any                       | (unchanged) | (unchanged)  |
//!
//! ```text
//!   Dispatching / Launching ──success──► Running ──update──► Updating
//!            │                            ▲  ▲                 │
//!         failure                         │  └────success──────┤
//!            ▼                            │                 failure
//!          Failed                         │                    ▼
//!                                         │              UpdateFailed
//!   Running ──stale heartbeat──► Unavailable ──heartbeat─┘
//!
//!   (any non-terminal) ──cancel──► Canceling ──success──► Canceled
//!   Unavailable / Failed ──cancel, no dispatch──────────► Canceled
//! ```

use std::fmt;

use appmgr_protocol::{
    Action, AppEvent, AppStatus, NamespaceEvent, NamespaceStatus, ResourceKind,
};
use chrono::{DateTime, Duration, Utc};

/// Kind-independent lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Command published, executor has not answered.
    Dispatching,
    /// Executor is working on the create.
    Launching,
    /// Healthy.
    Running,
    /// Create failed.
    Failed,
    /// Update in flight.
    Updating,
    /// Update failed, previous configuration still active.
    UpdateFailed,
    /// Cancel in flight.
    Canceling,
    /// Gone. Terminal.
    Canceled,
    /// Silent on heartbeats.
    Unavailable,
}

impl Phase {
    /// Every phase.
    pub const ALL: &'static [Phase] = &[
        Phase::Dispatching,
        Phase::Launching,
        Phase::Running,
        Phase::Failed,
        Phase::Updating,
        Phase::UpdateFailed,
        Phase::Canceling,
        Phase::Canceled,
        Phase::Unavailable,
    ];

    /// Phases a cancel request may leave from.
    pub const CANCELABLE: &'static [Phase] = &[
        Phase::Dispatching,
        Phase::Launching,
        Phase::Running,
        Phase::Failed,
        Phase::Updating,
        Phase::UpdateFailed,
        Phase::Canceling,
        Phase::Unavailable,
    ];

    /// Phases in which a create result is still expected.
    pub const CREATE_IN_FLIGHT: &'static [Phase] = &[Phase::Dispatching, Phase::Launching];

    /// Phases that accept a client update.
    pub const UPDATABLE: &'static [Phase] = &[Phase::Running, Phase::UpdateFailed];

    /// Phases with no live executor; cancellation completes locally.
    pub const CANCEL_WITHOUT_DISPATCH: &'static [Phase] = &[Phase::Unavailable, Phase::Failed];

    /// Phases subject to the listing retention window.
    pub const RETIRED: &'static [Phase] = &[Phase::Canceling, Phase::Canceled];

    /// App phases that do not block deleting their namespace.
    pub const INACTIVE: &'static [Phase] = &[Phase::Canceled, Phase::Canceling, Phase::Failed];

    /// Namespace phases a heartbeat sighting moves back to running.
    pub const HEARTBEAT_REVIVABLE: &'static [Phase] =
        &[Phase::Running, Phase::Failed, Phase::Unavailable];

    /// App phases recovered when their namespace reappears.
    pub const HEARTBEAT_RECOVERABLE: &'static [Phase] = &[Phase::Unavailable, Phase::Failed];

    /// True if this phase is one of `set`.
    pub fn is_in(self, set: &[Phase]) -> bool {
        set.contains(&self)
    }

    /// True for the terminal phase.
    pub fn is_terminal(self) -> bool {
        self == Phase::Canceled
    }
}

/// Result of an executor action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The executor completed the action.
    Succeeded,
    /// The executor gave up.
    Failed,
}

/// Kind-independent transition cause; maps onto `AppEvent` / `NamespaceEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Create dispatched.
    Dispatch,
    /// Create completed.
    LaunchSucceeded,
    /// Create failed.
    LaunchFailed,
    /// Update dispatched.
    Update,
    /// Update completed.
    UpdateSucceeded,
    /// Update failed.
    UpdateFailed,
    /// Cancel dispatched.
    Cancel,
    /// Cancel completed.
    CancelSucceeded,
    /// Cancel failed.
    CancelFailed,
    /// Missing from heartbeats.
    HeartbeatFailed,
    /// Back in heartbeats.
    HeartbeatRecovered,
}

impl Signal {
    /// Signal recorded when `action` is dispatched.
    pub fn requested(action: Action) -> Option<Signal> {
        match action {
            Action::Create => Some(Signal::Dispatch),
            Action::Update => Some(Signal::Update),
            Action::Cancel => Some(Signal::Cancel),
            Action::Detail => None,
        }
    }

    /// Signal recorded when `action` finishes with `outcome`.
    pub fn finished(action: Action, outcome: Outcome) -> Option<Signal> {
        match (action, outcome) {
            (Action::Create, Outcome::Succeeded) => Some(Signal::LaunchSucceeded),
            (Action::Create, Outcome::Failed) => Some(Signal::LaunchFailed),
            (Action::Update, Outcome::Succeeded) => Some(Signal::UpdateSucceeded),
            (Action::Update, Outcome::Failed) => Some(Signal::UpdateFailed),
            (Action::Cancel, Outcome::Succeeded) => Some(Signal::CancelSucceeded),
            (Action::Cancel, Outcome::Failed) => Some(Signal::CancelFailed),
            (Action::Detail, _) => None,
        }
    }

    /// Outcome carried by a result signal; `None` for requests and heartbeats.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            Signal::LaunchSucceeded | Signal::UpdateSucceeded | Signal::CancelSucceeded => {
                Some(Outcome::Succeeded)
            }
            Signal::LaunchFailed | Signal::UpdateFailed | Signal::CancelFailed => {
                Some(Outcome::Failed)
            }
            _ => None,
        }
    }
}

/// Feedback guard for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    /// Action the guard applies to.
    pub action: Action,
    /// Phases the record must be in; `None` admits any phase.
    pub required: Option<&'static [Phase]>,
    /// Phase entered on success; `None` leaves the status alone.
    pub on_success: Option<Phase>,
    /// Phase entered on failure; `None` leaves the status alone.
    pub on_failure: Option<Phase>,
}

impl Guard {
    /// Guard table row for `action`.
    pub fn for_action(action: Action) -> Guard {
        match action {
            Action::Create => Guard {
                action,
                required: Some(Phase::CREATE_IN_FLIGHT),
                on_success: Some(Phase::Running),
                on_failure: Some(Phase::Failed),
            },
            Action::Update => Guard {
                action,
                required: Some(&[Phase::Updating]),
                on_success: Some(Phase::Running),
                on_failure: Some(Phase::UpdateFailed),
            },
            Action::Cancel => Guard {
                action,
                required: Some(&[Phase::Canceling]),
                on_success: Some(Phase::Canceled),
                on_failure: None,
            },
            Action::Detail => Guard {
                action,
                required: None,
                on_success: None,
                on_failure: None,
            },
        }
    }

    /// True if a record in `phase` may take this action's result.
    pub fn admits(&self, phase: Phase) -> bool {
        self.required.is_none_or(|required| phase.is_in(required))
    }

    /// Phase to enter for `outcome`, if the status changes at all.
    pub fn target(&self, outcome: Outcome) -> Option<Phase> {
        match outcome {
            Outcome::Succeeded => self.on_success,
            Outcome::Failed => self.on_failure,
        }
    }
}

/// A status enumeration that follows the shared lifecycle.
pub trait Lifecycle:
    Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Matching event enumeration.
    type Event: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Resource kind using this status.
    const KIND: ResourceKind;

    /// Kind-independent phase of this status.
    fn phase(self) -> Phase;

    /// Status for a phase.
    fn from_phase(phase: Phase) -> Self;

    /// Event recorded for a signal.
    fn event(signal: Signal) -> Self::Event;

    /// Signal an event stands for.
    fn signal(event: Self::Event) -> Signal;

    /// Statuses for a set of phases, for store filters and CAS guards.
    fn statuses(phases: &[Phase]) -> Vec<Self> {
        phases.iter().map(|phase| Self::from_phase(*phase)).collect()
    }
}

impl Lifecycle for AppStatus {
    type Event = AppEvent;

    const KIND: ResourceKind = ResourceKind::App;

    fn phase(self) -> Phase {
        match self {
            AppStatus::Dispatching => Phase::Dispatching,
            AppStatus::Launching => Phase::Launching,
            AppStatus::Running => Phase::Running,
            AppStatus::Failed => Phase::Failed,
            AppStatus::Updating => Phase::Updating,
            AppStatus::UpdateFailed => Phase::UpdateFailed,
            AppStatus::Canceling => Phase::Canceling,
            AppStatus::Canceled => Phase::Canceled,
            AppStatus::Unavailable => Phase::Unavailable,
        }
    }

    fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Dispatching => AppStatus::Dispatching,
            Phase::Launching => AppStatus::Launching,
            Phase::Running => AppStatus::Running,
            Phase::Failed => AppStatus::Failed,
            Phase::Updating => AppStatus::Updating,
            Phase::UpdateFailed => AppStatus::UpdateFailed,
            Phase::Canceling => AppStatus::Canceling,
            Phase::Canceled => AppStatus::Canceled,
            Phase::Unavailable => AppStatus::Unavailable,
        }
    }

    fn event(signal: Signal) -> AppEvent {
        match signal {
            Signal::Dispatch => AppEvent::DispatchApp,
            Signal::LaunchSucceeded => AppEvent::LaunchAppSucceed,
            Signal::LaunchFailed => AppEvent::LaunchAppFailed,
            Signal::Update => AppEvent::UpdateApp,
            Signal::UpdateSucceeded => AppEvent::UpdateAppSucceed,
            Signal::UpdateFailed => AppEvent::UpdateAppFailed,
            Signal::Cancel => AppEvent::CancelApp,
            Signal::CancelSucceeded => AppEvent::CancelAppSucceed,
            Signal::CancelFailed => AppEvent::CancelAppFailed,
            Signal::HeartbeatFailed => AppEvent::AppHeartbeatFailed,
            Signal::HeartbeatRecovered => AppEvent::AppHeartbeatRecovered,
        }
    }

    fn signal(event: AppEvent) -> Signal {
        match event {
            AppEvent::DispatchApp => Signal::Dispatch,
            AppEvent::LaunchAppSucceed => Signal::LaunchSucceeded,
            AppEvent::LaunchAppFailed => Signal::LaunchFailed,
            AppEvent::UpdateApp => Signal::Update,
            AppEvent::UpdateAppSucceed => Signal::UpdateSucceeded,
            AppEvent::UpdateAppFailed => Signal::UpdateFailed,
            AppEvent::CancelApp => Signal::Cancel,
            AppEvent::CancelAppSucceed => Signal::CancelSucceeded,
            AppEvent::CancelAppFailed => Signal::CancelFailed,
            AppEvent::AppHeartbeatFailed => Signal::HeartbeatFailed,
            AppEvent::AppHeartbeatRecovered => Signal::HeartbeatRecovered,
        }
    }
}

impl Lifecycle for NamespaceStatus {
    type Event = NamespaceEvent;

    const KIND: ResourceKind = ResourceKind::Namespace;

    fn phase(self) -> Phase {
        match self {
            NamespaceStatus::Dispatching => Phase::Dispatching,
            NamespaceStatus::Launching => Phase::Launching,
            NamespaceStatus::Running => Phase::Running,
            NamespaceStatus::Failed => Phase::Failed,
            NamespaceStatus::Updating => Phase::Updating,
            NamespaceStatus::UpdateFailed => Phase::UpdateFailed,
            NamespaceStatus::Canceling => Phase::Canceling,
            NamespaceStatus::Canceled => Phase::Canceled,
            NamespaceStatus::Unavailable => Phase::Unavailable,
        }
    }

    fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Dispatching => NamespaceStatus::Dispatching,
            Phase::Launching => NamespaceStatus::Launching,
            Phase::Running => NamespaceStatus::Running,
            Phase::Failed => NamespaceStatus::Failed,
            Phase::Updating => NamespaceStatus::Updating,
            Phase::UpdateFailed => NamespaceStatus::UpdateFailed,
            Phase::Canceling => NamespaceStatus::Canceling,
            Phase::Canceled => NamespaceStatus::Canceled,
            Phase::Unavailable => NamespaceStatus::Unavailable,
        }
    }

    fn event(signal: Signal) -> NamespaceEvent {
        match signal {
            Signal::Dispatch => NamespaceEvent::DispatchNs,
            Signal::LaunchSucceeded => NamespaceEvent::LaunchNsSucceed,
            Signal::LaunchFailed => NamespaceEvent::LaunchNsFailed,
            Signal::Update => NamespaceEvent::UpdateNs,
            Signal::UpdateSucceeded => NamespaceEvent::UpdateNsSucceed,
            Signal::UpdateFailed => NamespaceEvent::UpdateNsFailed,
            Signal::Cancel => NamespaceEvent::CancelNs,
            Signal::CancelSucceeded => NamespaceEvent::CancelNsSucceed,
            Signal::CancelFailed => NamespaceEvent::CancelNsFailed,
            Signal::HeartbeatFailed => NamespaceEvent::NsHeartbeatFailed,
            Signal::HeartbeatRecovered => NamespaceEvent::NsHeartbeatRecovered,
        }
    }

    fn signal(event: NamespaceEvent) -> Signal {
        match event {
            NamespaceEvent::DispatchNs => Signal::Dispatch,
            NamespaceEvent::LaunchNsSucceed => Signal::LaunchSucceeded,
            NamespaceEvent::LaunchNsFailed => Signal::LaunchFailed,
            NamespaceEvent::UpdateNs => Signal::Update,
            NamespaceEvent::UpdateNsSucceed => Signal::UpdateSucceeded,
            NamespaceEvent::UpdateNsFailed => Signal::UpdateFailed,
            NamespaceEvent::CancelNs => Signal::Cancel,
            NamespaceEvent::CancelNsSucceed => Signal::CancelSucceeded,
            NamespaceEvent::CancelNsFailed => Signal::CancelFailed,
            NamespaceEvent::NsHeartbeatFailed => Signal::HeartbeatFailed,
            NamespaceEvent::NsHeartbeatRecovered => Signal::HeartbeatRecovered,
        }
    }
}

/// Convert a configured window into a [`Duration`], saturating at the
/// largest representable span.
pub fn window(span: std::time::Duration) -> Duration {
    i64::try_from(span.as_secs())
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// A persisted record governed by a [`Lifecycle`] status.
pub trait ManagedResource: Clone + fmt::Debug + Send + Sync + 'static {
    /// Status enumeration of the record.
    type Status: Lifecycle;

    /// Record id.
    fn id(&self) -> &str;

    /// Owning team.
    fn team_id(&self) -> &str;

    /// Current status.
    fn status(&self) -> Self::Status;

    /// Whether the record is hidden from listings.
    fn is_hidden(&self) -> bool;

    /// Last write time.
    fn last_modified(&self) -> DateTime<Utc>;

    /// Current phase.
    fn phase(&self) -> Phase {
        self.status().phase()
    }

    /// True if `team_id` owns this record.
    fn is_owned_by(&self, team_id: &str) -> bool {
        self.team_id() == team_id
    }

    /// True if the record has not been written for longer than `age`.
    ///
    /// An `age` reaching past the earliest representable time is never exceeded.
    fn untouched_for(&self, now: DateTime<Utc>, age: Duration) -> bool {
        now.checked_sub_signed(age)
            .is_some_and(|cutoff| self.last_modified() < cutoff)
    }

    /// True if the record is retired and older than the retention window.
    fn retention_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.phase().is_in(Phase::RETIRED) && self.untouched_for(now, retention)
    }
}
