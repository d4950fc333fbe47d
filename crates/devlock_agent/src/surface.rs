//! Enforcement surface interface and the signal bus feeding it.
//!
//! The controller never talks to the overlay directly. It emits
//! [`LockSignal`]s onto a [`SignalBus`]; every live overlay subscribed to the
//! bus receives them on its own thread.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = Arc::new(SignalBus::new());
//! let signals = bus.subscribe();
//!
//! std::thread::spawn(move || {
//!     let mut overlay = LockOverlay::new(presenter);
//!     overlay.run(signals);
//! });
//!
//! let controller = LockController::new(Arc::clone(&bus));
//! ```

use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// The mechanism that blocks normal device use while locked.
///
/// Both calls are fire-and-forget. Implementations must not block on
/// rendering.
pub trait EnforcementSurface: Send + Sync {
    /// Presents (or refreshes) the non-dismissible lock view.
    fn activate(&self, message: &str, support_phone: &str);

    /// Tears down any active lock view. A no-op if nothing is shown.
    fn release(&self);
}

impl<T: EnforcementSurface + ?Sized> EnforcementSurface for Arc<T> {
    fn activate(&self, message: &str, support_phone: &str) {
        (**self).activate(message, support_phone);
    }

    fn release(&self) {
        (**self).release();
    }
}

/// A signal sent to enforcement surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockSignal {
    /// Show the lock view with this content.
    Activate {
        /// Message shown on the view.
        message: String,
        /// Support phone offered on the view.
        support_phone: String,
    },
    /// Tear down the lock view.
    Release,
}

/// A publish/subscribe channel distributing lock signals to surfaces.
///
/// The bus:
/// - Delivers every signal to every live subscriber, in emit order
/// - Treats emitting with no subscribers as a no-op
/// - Drops subscribers whose receiver was dropped
/// - Replays the current activation to late subscribers
pub struct SignalBus {
    subscribers: RwLock<Vec<Sender<LockSignal>>>,
    current: Mutex<Option<LockSignal>>,
}

impl SignalBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            current: Mutex::new(None),
        }
    }

    /// Subscribes to the bus.
    ///
    /// If a lock is currently active, the receiver starts with its
    /// activation so that a surface started late still enforces it.
    pub fn subscribe(&self) -> Receiver<LockSignal> {
        let (tx, rx) = mpsc::channel();
        let current = self.current.lock();
        if let Some(signal) = current.as_ref() {
            // receiver is alive, send cannot fail
            let _ = tx.send(signal.clone());
        }
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits a signal to all subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, signal: LockSignal) -> usize {
        let mut current = self.current.lock();
        *current = match &signal {
            LockSignal::Activate { .. } => Some(signal.clone()),
            LockSignal::Release => None,
        };

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(signal.clone()).is_ok());
        let delivered = subscribers.len();
        tracing::debug!(?signal, delivered, "lock signal emitted");
        delivered
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EnforcementSurface for SignalBus {
    fn activate(&self, message: &str, support_phone: &str) {
        self.emit(LockSignal::Activate {
            message: message.to_string(),
            support_phone: support_phone.to_string(),
        });
    }

    fn release(&self) {
        self.emit(LockSignal::Release);
    }
}

/// A surface that records every call, for testing.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    signals: Mutex<Vec<LockSignal>>,
}

impl RecordingSurface {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded signals in order.
    pub fn signals(&self) -> Vec<LockSignal> {
        self.signals.lock().clone()
    }

    /// Returns the number of `activate` calls.
    pub fn activations(&self) -> usize {
        self.signals
            .lock()
            .iter()
            .filter(|s| matches!(s, LockSignal::Activate { .. }))
            .count()
    }

    /// Returns the number of `release` calls.
    pub fn releases(&self) -> usize {
        self.signals
            .lock()
            .iter()
            .filter(|s| matches!(s, LockSignal::Release))
            .count()
    }
}

impl EnforcementSurface for RecordingSurface {
    fn activate(&self, message: &str, support_phone: &str) {
        self.signals.lock().push(LockSignal::Activate {
            message: message.to_string(),
            support_phone: support_phone.to_string(),
        });
    }

    fn release(&self) {
        self.signals.lock().push(LockSignal::Release);
    }
}
