//! Transport layer abstraction for status queries.

use crate::error::{SyncError, SyncResult};
use crate::identity::DeviceIdentity;
use devlock_protocol::DeviceStatus;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A status transport performs one status exchange with the authority.
///
/// Implementations must not retry internally; retries belong to the
/// scheduler. Every failure is reported as [`SyncError::Network`].
pub trait StatusTransport: Send + Sync {
    /// Fetches the status of `identity`, bounded by `timeout`.
    fn fetch_status(
        &self,
        identity: &DeviceIdentity,
        timeout: Duration,
    ) -> SyncResult<DeviceStatus>;
}

#[derive(Debug, Clone)]
enum MockResponse {
    Status(DeviceStatus),
    Failure(String),
}

/// A mock transport for testing.
#[derive(Debug)]
pub struct MockTransport {
    response: Mutex<MockResponse>,
    calls: AtomicUsize,
    last_identity: Mutex<Option<DeviceIdentity>>,
    delay: Mutex<Duration>,
}

impl MockTransport {
    /// Creates a mock answering with an unlocked status.
    pub fn new() -> Self {
        Self {
            response: Mutex::new(MockResponse::Status(DeviceStatus::unlocked())),
            calls: AtomicUsize::new(0),
            last_identity: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Answers every following request with `status`.
    pub fn set_status(&self, status: DeviceStatus) {
        *self.response.lock() = MockResponse::Status(status);
    }

    /// Fails every following request with a network error.
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.response.lock() = MockResponse::Failure(message.into());
    }

    /// Makes every following request take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Returns the number of requests made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the identity of the last request.
    pub fn last_identity(&self) -> Option<DeviceIdentity> {
        self.last_identity.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTransport for MockTransport {
    fn fetch_status(
        &self,
        identity: &DeviceIdentity,
        _timeout: Duration,
    ) -> SyncResult<DeviceStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_identity.lock() = Some(identity.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        match self.response.lock().clone() {
            MockResponse::Status(status) => Ok(status),
            MockResponse::Failure(message) => Err(SyncError::network(message)),
        }
    }
}
