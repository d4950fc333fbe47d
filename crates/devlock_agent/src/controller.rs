//! Lock state machine.
//!
//! ```text
//! UNLOCKED ──locked──► LOCKED(message, phone)
//!    ▲                     │  locked, same content: no-op
//!    │                     │  locked, new content: refresh
//!    └──────unlocked───────┘
//! ```
//!
//! The controller owns the lock state. It is only mutated by
//! [`LockController::apply`], which is called once per successful sync.

use crate::store::StateStore;
use crate::surface::EnforcementSurface;
use devlock_protocol::{DeviceStatus, DEFAULT_LOCK_MESSAGE};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// The enforcement state of the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// Normal use allowed.
    Unlocked,
    /// Device blocked behind the lock view.
    Locked {
        /// Message shown on the view.
        message: String,
        /// Support phone offered on the view.
        support_phone: String,
    },
}

impl LockState {
    /// Derives the target state from a status.
    pub fn from_status(status: &DeviceStatus) -> Self {
        if status.locked {
            LockState::Locked {
                message: status.lock_message.clone(),
                support_phone: status.support_phone.clone(),
            }
        } else {
            LockState::Unlocked
        }
    }

    /// Returns true if enforcement is active.
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked { .. })
    }

    /// Returns a serializable snapshot of this state.
    pub fn snapshot(&self) -> LockSnapshot {
        match self {
            LockState::Unlocked => LockSnapshot::unlocked(),
            LockState::Locked {
                message,
                support_phone,
            } => LockSnapshot {
                enforced: true,
                message: message.clone(),
                support_phone: support_phone.clone(),
            },
        }
    }
}

/// Flat, persisted form of [`LockState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSnapshot {
    /// Whether enforcement is active.
    pub enforced: bool,
    /// Lock message.
    pub message: String,
    /// Support phone.
    pub support_phone: String,
}

impl LockSnapshot {
    /// Snapshot of the unlocked state.
    pub fn unlocked() -> Self {
        Self {
            enforced: false,
            message: DEFAULT_LOCK_MESSAGE.to_string(),
            support_phone: String::new(),
        }
    }

    /// Converts back to a state.
    pub fn to_state(&self) -> LockState {
        if self.enforced {
            LockState::Locked {
                message: self.message.clone(),
                support_phone: self.support_phone.clone(),
            }
        } else {
            LockState::Unlocked
        }
    }
}

/// Lock state used before the first successful sync of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialLockPolicy {
    /// Start unlocked until the authority says otherwise.
    #[default]
    FailOpen,
    /// Start from the last persisted snapshot.
    RestoreLastKnown,
}

/// Effect of one [`LockController::apply`] call on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Unlocked → locked; surface activated.
    Activated,
    /// Locked with new content; surface re-activated.
    Refreshed,
    /// Locked → unlocked; surface released.
    Released,
    /// First confirmed unlock of this process; surface released to clear
    /// any view left over from an earlier process.
    Cleared,
    /// No change; surface untouched.
    Unchanged,
}

struct ControllerState {
    state: LockState,
    /// Whether a status has been applied in this process.
    confirmed: bool,
}

/// Holds the lock state and drives the enforcement surface.
pub struct LockController<S: EnforcementSurface> {
    surface: S,
    store: Option<Arc<dyn StateStore>>,
    inner: Mutex<ControllerState>,
}

impl<S: EnforcementSurface> LockController<S> {
    /// Creates an unlocked controller without persistence.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            store: None,
            inner: Mutex::new(ControllerState {
                state: LockState::Unlocked,
                confirmed: false,
            }),
        }
    }

    /// Creates a controller persisting its state to `store`.
    ///
    /// With [`InitialLockPolicy::RestoreLastKnown`] a previously locked
    /// device comes back locked and the surface is activated immediately.
    pub fn with_store(surface: S, store: Arc<dyn StateStore>, policy: InitialLockPolicy) -> Self {
        let saved = match store.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "failed to load lock snapshot, starting unlocked");
                None
            }
        };

        let state = match (policy, saved) {
            (InitialLockPolicy::RestoreLastKnown, Some(snapshot)) => snapshot.to_state(),
            (InitialLockPolicy::FailOpen, Some(snapshot)) if snapshot.enforced => {
                info!("previous lock snapshot ignored under fail-open policy");
                LockState::Unlocked
            }
            _ => LockState::Unlocked,
        };

        if let LockState::Locked {
            message,
            support_phone,
        } = &state
        {
            info!(%message, "restoring last known lock");
            surface.activate(message, support_phone);
        }

        Self {
            surface,
            store: Some(store),
            inner: Mutex::new(ControllerState {
                state,
                confirmed: false,
            }),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> LockState {
        self.inner.lock().state.clone()
    }

    /// Returns the current state as a snapshot.
    pub fn snapshot(&self) -> LockSnapshot {
        self.inner.lock().state.snapshot()
    }

    /// Returns true if enforcement is active.
    pub fn is_locked(&self) -> bool {
        self.inner.lock().state.is_locked()
    }

    /// Returns the enforcement surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Applies a status from a successful sync.
    ///
    /// Idempotent: applying the same status twice leaves the state and the
    /// surface as they were after the first call.
    pub fn apply(&self, status: &DeviceStatus) -> Transition {
        let mut inner = self.inner.lock();
        let next = LockState::from_status(status);
        let first = !inner.confirmed;
        inner.confirmed = true;

        let transition = match (&inner.state, &next) {
            (current, LockState::Locked { .. }) if *current == next => Transition::Unchanged,
            (LockState::Locked { .. }, LockState::Locked { .. }) => Transition::Refreshed,
            (LockState::Unlocked, LockState::Locked { .. }) => Transition::Activated,
            (LockState::Locked { .. }, LockState::Unlocked) => Transition::Released,
            (LockState::Unlocked, LockState::Unlocked) if first => Transition::Cleared,
            (LockState::Unlocked, LockState::Unlocked) => Transition::Unchanged,
        };

        // Surface calls stay under the lock so signals leave in apply order.
        match (&transition, &next) {
            (
                Transition::Activated | Transition::Refreshed,
                LockState::Locked {
                    message,
                    support_phone,
                },
            ) => {
                info!(?transition, %message, %support_phone, "device locked");
                self.surface.activate(message, support_phone);
            }
            (Transition::Released, _) => {
                info!("device unlocked");
                self.surface.release();
            }
            (Transition::Cleared, _) => {
                self.surface.release();
            }
            _ => {}
        }

        if transition != Transition::Unchanged {
            inner.state = next;
            self.persist(&inner.state);
        }

        transition
    }

    fn persist(&self, state: &LockState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&state.snapshot()) {
                warn!(error = %e, "failed to persist lock snapshot");
            }
        }
    }
}
