//! Terminal rendering of the lock overlay.
//!
//! The overlay thread prints the lock view and reacts to two commands typed
//! on stdin: `call` dials support, `back` tries to dismiss the view.

use devlock_agent::{Dialer, LockOverlay, LockSignal, OverlayView, Presenter};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How often the overlay loop checks for typed commands.
const INPUT_POLL: Duration = Duration::from_millis(200);

/// A command typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Dial the support phone.
    CallSupport,
    /// Try to leave the lock view.
    Dismiss,
}

impl UserAction {
    /// Parses a typed line.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Some(UserAction::CallSupport),
            "back" | "b" | "dismiss" => Some(UserAction::Dismiss),
            _ => None,
        }
    }
}

/// Presents the lock view on a terminal.
pub struct TerminalPresenter<W: Write + Send> {
    out: W,
}

impl TerminalPresenter<io::Stdout> {
    /// Creates a presenter writing to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    /// Creates a presenter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(error = %e, "failed to render lock view");
        }
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn show(&mut self, view: &OverlayView) {
        let mut text = String::from("\n==================== DEVICE LOCKED ====================\n");
        text.push_str(&format!("  {}\n", view.message));
        if let Some(uri) = view.support_uri() {
            text.push_str(&format!("  Support: {} (type `call` to dial)\n", uri));
        }
        text.push_str("=======================================================\n");
        self.write(&text);
    }

    fn hide(&mut self) {
        self.write("\n------------------- device unlocked -------------------\n");
    }
}

/// A dialer that only logs the request.
pub struct LogDialer;

impl Dialer for LogDialer {
    fn dial(&self, uri: &str) {
        info!(%uri, "opening dialer");
    }
}

/// Reads commands from stdin on a background thread.
///
/// The thread is detached; it ends with the process.
pub fn spawn_input(actions: Sender<UserAction>) -> io::Result<()> {
    thread::Builder::new()
        .name("overlay-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(action) = UserAction::parse(&line) {
                    if actions.send(action).is_err() {
                        break;
                    }
                }
            }
        })?;
    Ok(())
}

/// Feeds lock signals and user commands to the overlay until the signal bus
/// is closed.
pub fn drive<P: Presenter>(
    overlay: &mut LockOverlay<P>,
    signals: &Receiver<LockSignal>,
    actions: &Receiver<UserAction>,
    dialer: &dyn Dialer,
) {
    loop {
        match signals.recv_timeout(INPUT_POLL) {
            Ok(signal) => {
                overlay.handle(signal);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for action in actions.try_iter() {
            match action {
                UserAction::CallSupport => {
                    if !overlay.call_support(dialer) {
                        info!("no support number to call");
                    }
                }
                UserAction::Dismiss => {
                    if !overlay.request_dismiss() {
                        info!("device is locked, dismissal refused");
                    }
                }
            }
        }
    }
}
