//! Periodic scheduling of sync attempts.
//!
//! The scheduler runs one cycle per cadence tick. A cycle is:
//! 1. Skip if another cycle is still in flight (single-flight)
//! 2. Skip if the connectivity precondition does not hold
//! 3. Run an attempt; on a retryable failure wait per the retry policy and
//!    try again, up to the policy's attempt limit
//!
//! Attempts run on the blocking thread pool so the network call never stalls
//! the timer. Ticks missed while a cycle runs are skipped, not replayed.

use crate::config::{NetworkRequirement, RetryPolicy, ScheduleConfig};
use crate::connectivity::Connectivity;
use crate::engine::{SyncOutcome, SyncRunner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What a scheduler cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// Attempts ran; `outcome` is the last one.
    Completed {
        /// Outcome of the last attempt.
        outcome: SyncOutcome,
        /// Number of attempts made.
        attempts: u32,
    },
    /// Another cycle was in flight; nothing ran.
    Coalesced,
    /// No network path; nothing ran.
    Offline,
    /// Shutdown requested during backoff.
    Interrupted {
        /// Number of attempts made before the interruption.
        attempts: u32,
    },
}

/// Resets the in-flight flag when dropped.
///
/// Shared between the cycle and its running attempt, so the flag stays set
/// until both are gone even if the cycle future is dropped mid-attempt.
struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives a [`SyncRunner`] on a fixed cadence.
pub struct Scheduler<R: SyncRunner> {
    runner: Arc<R>,
    config: ScheduleConfig,
    retry: Arc<dyn RetryPolicy>,
    connectivity: Arc<dyn Connectivity>,
    in_flight: Arc<AtomicBool>,
}

impl<R: SyncRunner> Scheduler<R> {
    /// Creates a scheduler.
    pub fn new(
        runner: Arc<R>,
        config: ScheduleConfig,
        retry: Arc<dyn RetryPolicy>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            runner,
            config,
            retry,
            connectivity,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the runner.
    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    /// Returns true while a cycle is running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs a single cycle now.
    ///
    /// If a cycle is already running this returns
    /// [`CycleReport::Coalesced`] immediately.
    pub async fn run_cycle(&self) -> CycleReport {
        let (_keep_open, mut shutdown) = watch::channel(false);
        self.cycle(&mut shutdown).await
    }

    /// Runs cycles on the configured cadence until `shutdown` becomes true.
    ///
    /// The first cycle starts immediately. An in-flight attempt is never
    /// cancelled; shutdown takes effect between attempts.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.interval.as_secs(),
            network = ?self.config.network,
            "scheduler started"
        );

        loop {
            let mut stop = shutdown.clone();
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.cycle(&mut shutdown).await;
                    debug!(?report, "cycle finished");
                    if matches!(report, CycleReport::Interrupted { .. }) {
                        break;
                    }
                }
                _ = stopped(&mut stop) => break,
            }
        }

        info!("scheduler stopped");
    }

    async fn cycle(&self, shutdown: &mut watch::Receiver<bool>) -> CycleReport {
        let Some(guard) = FlightGuard::acquire(&self.in_flight).map(Arc::new) else {
            debug!("sync already in flight, tick coalesced");
            return CycleReport::Coalesced;
        };

        if !self.network_available().await {
            info!("no network path, sync deferred");
            return CycleReport::Offline;
        }

        let max_attempts = self.retry.max_attempts();
        let mut attempts = 0;
        loop {
            let outcome = self.attempt(&guard).await;
            attempts += 1;

            if outcome != SyncOutcome::RetryableFailure || attempts >= max_attempts {
                if outcome == SyncOutcome::RetryableFailure {
                    warn!(attempts, "retries exhausted, resuming normal cadence");
                }
                return CycleReport::Completed { outcome, attempts };
            }

            let delay = self.retry.delay_for_attempt(attempts);
            info!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "sync failed, backing off"
            );
            if sleep_or_stop(delay, shutdown).await {
                return CycleReport::Interrupted { attempts };
            }
        }
    }

    async fn attempt(&self, guard: &Arc<FlightGuard>) -> SyncOutcome {
        let runner = Arc::clone(&self.runner);
        let guard = Arc::clone(guard);
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            runner.run_once()
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "sync attempt aborted");
                SyncOutcome::RetryableFailure
            }
        }
    }

    async fn network_available(&self) -> bool {
        if self.config.network == NetworkRequirement::NotRequired {
            return true;
        }
        let connectivity = Arc::clone(&self.connectivity);
        tokio::task::spawn_blocking(move || connectivity.is_connected())
            .await
            .unwrap_or(false)
    }
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleeps for `delay`. Returns true if shutdown was requested first.
async fn sleep_or_stop(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stopped(shutdown) => true,
    }
}
