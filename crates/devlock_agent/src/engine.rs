//! Sync engine: one poll-interpret-apply attempt.

use crate::controller::{LockController, Transition};
use crate::error::{SyncError, SyncResult};
use crate::identity::IdentityStore;
use crate::surface::EnforcementSurface;
use crate::transport::StatusTransport;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, warn};

/// Result of one sync attempt, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Status fetched and applied.
    Success,
    /// Transient failure; try again later.
    RetryableFailure,
    /// Retrying cannot help until something outside the agent changes.
    TerminalFailure,
}

impl SyncOutcome {
    /// Returns true for [`SyncOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncOutcome::Success => "success",
            SyncOutcome::RetryableFailure => "retryable failure",
            SyncOutcome::TerminalFailure => "terminal failure",
        })
    }
}

/// Statistics about sync attempts.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of attempts.
    pub attempts: u64,
    /// Attempts that applied a status.
    pub successes: u64,
    /// Attempts that ended in a retryable failure.
    pub retryable_failures: u64,
    /// Attempts that ended in a terminal failure.
    pub terminal_failures: u64,
    /// Wall-clock time of the last success.
    pub last_success: Option<SystemTime>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Anything the scheduler can drive.
pub trait SyncRunner: Send + Sync + 'static {
    /// Runs one attempt. Never panics on bad input, never returns an error.
    fn run_once(&self) -> SyncOutcome;
}

/// The sync engine reads the identity, queries the authority and hands the
/// answer to the lock controller.
pub struct SyncEngine<I: IdentityStore, T: StatusTransport, S: EnforcementSurface> {
    identity: I,
    transport: T,
    controller: Arc<LockController<S>>,
    timeout: Duration,
    stats: RwLock<SyncStats>,
}

impl<I: IdentityStore, T: StatusTransport, S: EnforcementSurface> SyncEngine<I, T, S> {
    /// Creates a new sync engine. `timeout` bounds each status request.
    pub fn new(
        identity: I,
        transport: T,
        controller: Arc<LockController<S>>,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            transport,
            controller,
            timeout,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the lock controller.
    pub fn controller(&self) -> &Arc<LockController<S>> {
        &self.controller
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Performs one sync attempt.
    ///
    /// Every failure is converted into an outcome. The lock state is only
    /// touched when the attempt succeeds.
    pub fn run_once(&self) -> SyncOutcome {
        let start = Instant::now();
        let result = self.try_sync();
        let outcome = match &result {
            Ok(_) => SyncOutcome::Success,
            Err(e) => e.outcome(),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(transition) => debug!(%outcome, ?transition, elapsed_ms, "sync attempt finished"),
            Err(SyncError::IdentityMissing) => {
                error!(%outcome, "no device identity, skipping sync")
            }
            Err(e) => warn!(%outcome, error = %e, elapsed_ms, "sync attempt failed"),
        }

        self.record(&result, outcome);
        outcome
    }

    fn try_sync(&self) -> SyncResult<Transition> {
        let identity = self.identity.get()?.ok_or(SyncError::IdentityMissing)?;

        debug!(imei = %identity, "fetching device status");
        let status = self.transport.fetch_status(&identity, self.timeout)?;

        if !status.details.is_empty() {
            debug!(details = ?status.details, "status details");
        }

        Ok(self.controller.apply(&status))
    }

    fn record(&self, result: &SyncResult<Transition>, outcome: SyncOutcome) {
        let mut stats = self.stats.write();
        stats.attempts += 1;
        match outcome {
            SyncOutcome::Success => {
                stats.successes += 1;
                stats.last_success = Some(SystemTime::now());
                stats.last_error = None;
            }
            SyncOutcome::RetryableFailure => stats.retryable_failures += 1,
            SyncOutcome::TerminalFailure => stats.terminal_failures += 1,
        }
        if let Err(e) = result {
            stats.last_error = Some(e.to_string());
        }
    }
}

impl<I, T, S> SyncRunner for SyncEngine<I, T, S>
where
    I: IdentityStore + 'static,
    T: StatusTransport + 'static,
    S: EnforcementSurface + 'static,
{
    fn run_once(&self) -> SyncOutcome {
        SyncEngine::run_once(self)
    }
}
