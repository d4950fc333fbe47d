//! Configuration for the agent.

use crate::controller::InitialLockPolicy;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the persisted device identity inside the data directory.
pub const IDENTITY_FILE: &str = "identity.json";

/// File name of the persisted lock snapshot inside the data directory.
pub const LOCK_STATE_FILE: &str = "lock_state.json";

/// Top-level agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Status endpoint of the authority (e.g., "https://mdm.example.com/api/devices/sync").
    pub endpoint: String,
    /// Private, application-scoped directory holding identity and lock state.
    pub data_dir: PathBuf,
    /// Request timeouts.
    pub request: RequestConfig,
    /// Cadence and connectivity requirements.
    pub schedule: ScheduleConfig,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Lock state before the first successful sync.
    pub initial_policy: InitialLockPolicy,
}

impl AgentConfig {
    /// Creates a new agent configuration.
    pub fn new(endpoint: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            data_dir: data_dir.into(),
            request: RequestConfig::default(),
            schedule: ScheduleConfig::default(),
            retry: RetryConfig::default(),
            initial_policy: InitialLockPolicy::default(),
        }
    }

    /// Sets the request configuration.
    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }

    /// Sets the schedule configuration.
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the initial lock policy.
    pub fn with_initial_policy(mut self, policy: InitialLockPolicy) -> Self {
        self.initial_policy = policy;
        self
    }

    /// Path of the identity record.
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join(IDENTITY_FILE)
    }

    /// Path of the lock snapshot.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_STATE_FILE)
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Timeouts for one status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    /// Time allowed to establish the connection.
    pub connect_timeout: Duration,
    /// Time allowed to receive the response once connected.
    pub read_timeout: Duration,
}

impl RequestConfig {
    /// Creates a request configuration.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    /// Upper bound on a whole request, connect plus read.
    pub fn total_timeout(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(5))
    }
}

/// Network condition required before a sync attempt starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkRequirement {
    /// Attempt regardless of connectivity.
    NotRequired,
    /// Attempt only when some network path to the authority exists.
    #[default]
    Connected,
}

/// Cadence configuration for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Interval between sync cycles.
    pub interval: Duration,
    /// Connectivity precondition.
    pub network: NetworkRequirement,
}

impl ScheduleConfig {
    /// Creates a schedule with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            network: NetworkRequirement::default(),
        }
    }

    /// Sets the connectivity requirement.
    pub fn with_network(mut self, network: NetworkRequirement) -> Self {
        self.network = network;
        self
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60))
    }
}

/// Shape of the delay curve between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Delay grows by `multiplier` after every failed attempt.
    Exponential {
        /// Growth factor. Values below 1.0 (and NaN) are treated as 1.0.
        multiplier: f64,
    },
    /// Every retry waits `initial_delay`.
    Fixed,
}

/// A retry policy decides how many attempts a cycle gets and how long to
/// wait between them.
pub trait RetryPolicy: Send + Sync {
    /// Maximum number of attempts per cycle, including the first one.
    fn max_attempts(&self) -> u32;

    /// Delay before the given attempt (0-indexed). Attempt 0 never waits.
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per cycle.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Delay curve.
    pub backoff: Backoff,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates an exponential retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(5 * 60),
            backoff: Backoff::Exponential { multiplier: 2.0 },
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the delay curve.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }
}

impl RetryPolicy for RetryConfig {
    fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = match self.backoff {
            Backoff::Exponential { multiplier } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                // f64::max drops NaN
                self.initial_delay.as_secs_f64() * multiplier.max(1.0).powi(exponent)
            }
            Backoff::Fixed => self.initial_delay.as_secs_f64(),
        };

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter && delay_secs > 0.0 {
            // Up to 25% extra
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
