//! Lock overlay runtime.
//!
//! [`LockOverlay`] is the receiving end of the [`SignalBus`](crate::SignalBus).
//! It keeps at most one [`OverlayView`] alive: a repeated activation updates
//! the view in place, a release tears it down, and dismissal requests are
//! refused while it is shown.

use crate::surface::LockSignal;
use std::sync::mpsc::Receiver;
use tracing::{debug, info};

/// Content of the lock view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayView {
    /// Message shown on the view.
    pub message: String,
    /// Support phone; empty when none was provided.
    pub support_phone: String,
}

impl OverlayView {
    /// Returns the dialer URI for the support phone, if there is one.
    pub fn support_uri(&self) -> Option<String> {
        let phone = self.support_phone.trim();
        if phone.is_empty() {
            None
        } else {
            Some(format!("tel:{}", phone))
        }
    }
}

/// Renders the lock view.
pub trait Presenter: Send {
    /// Shows `view`, replacing whatever this presenter currently shows.
    fn show(&mut self, view: &OverlayView);

    /// Removes the view.
    fn hide(&mut self);
}

/// Opens the phone dialer. One-way; no result is reported back.
pub trait Dialer {
    /// Opens the dialer with `uri` (a `tel:` URI).
    fn dial(&self, uri: &str);
}

/// The enforcement view driven by lock signals.
pub struct LockOverlay<P: Presenter> {
    presenter: P,
    view: Option<OverlayView>,
}

impl<P: Presenter> LockOverlay<P> {
    /// Creates an overlay with nothing shown.
    pub fn new(presenter: P) -> Self {
        Self {
            presenter,
            view: None,
        }
    }

    /// Returns true while the lock view is shown.
    pub fn is_active(&self) -> bool {
        self.view.is_some()
    }

    /// Returns the current view.
    pub fn view(&self) -> Option<&OverlayView> {
        self.view.as_ref()
    }

    /// Returns the presenter.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Handles one signal. Returns true if the view changed.
    pub fn handle(&mut self, signal: LockSignal) -> bool {
        match signal {
            LockSignal::Activate {
                message,
                support_phone,
            } => {
                let view = OverlayView {
                    message,
                    support_phone,
                };
                if self.view.as_ref() == Some(&view) {
                    return false;
                }
                self.presenter.show(&view);
                info!(message = %view.message, "lock overlay shown");
                self.view = Some(view);
                true
            }
            LockSignal::Release => {
                if self.view.take().is_none() {
                    debug!("release with no overlay shown");
                    return false;
                }
                self.presenter.hide();
                info!("lock overlay dismissed");
                true
            }
        }
    }

    /// Handles a user dismissal attempt (back navigation and the like).
    ///
    /// Returns true if the overlay may close, which is only when nothing is
    /// shown.
    pub fn request_dismiss(&self) -> bool {
        if self.is_active() {
            debug!("dismissal refused while locked");
            false
        } else {
            true
        }
    }

    /// Opens the dialer with the support phone. Returns true if dialed.
    pub fn call_support(&self, dialer: &dyn Dialer) -> bool {
        match self.view.as_ref().and_then(OverlayView::support_uri) {
            Some(uri) => {
                dialer.dial(&uri);
                true
            }
            None => false,
        }
    }

    /// Processes signals until every sender is gone.
    pub fn run(&mut self, signals: Receiver<LockSignal>) {
        for signal in signals {
            self.handle(signal);
        }
        debug!("signal bus closed, overlay loop finished");
    }
}
