//! HTTP transport implementation.
//!
//! This module provides an HTTP-based status transport. The actual HTTP
//! client is abstracted via a trait so that tests can substitute a scripted
//! client; [`ReqwestClient`] is the production implementation.

use crate::error::{SyncError, SyncResult};
use crate::identity::DeviceIdentity;
use crate::transport::StatusTransport;
use devlock_protocol::{DeviceStatus, StatusQuery};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP status code the authority answers a status query with.
const STATUS_OK: u16 = 200;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request with the given query pairs.
    ///
    /// Returns `Err` only when no response was received at all.
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, String>;
}

/// HTTP-based status transport.
pub struct HttpTransport<C: HttpClient> {
    /// Status endpoint (e.g., "https://mdm.example.com/api/devices/sync").
    endpoint: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(endpoint: impl Into<String>, client: C) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn fail(&self, message: String) -> SyncError {
        warn!(endpoint = %self.endpoint, error = %message, "status request failed");
        *self.last_error.write() = Some(message.clone());
        SyncError::network(message)
    }
}

impl<C: HttpClient> StatusTransport for HttpTransport<C> {
    fn fetch_status(
        &self,
        identity: &DeviceIdentity,
        timeout: Duration,
    ) -> SyncResult<DeviceStatus> {
        let query = StatusQuery::new(identity.as_str());
        let response = self
            .client
            .get(&self.endpoint, &query.pairs(), timeout)
            .map_err(|e| self.fail(e))?;

        if response.status != STATUS_OK {
            return Err(self.fail(format!("authority returned status {}", response.status)));
        }

        let status = DeviceStatus::decode(&response.body)
            .map_err(|e| self.fail(format!("malformed status body: {}", e)))?;

        *self.last_error.write() = None;
        debug!(locked = status.locked, "status received");
        Ok(status)
    }
}

/// HTTP client built on `reqwest`.
///
/// Requests are driven to completion on a small runtime owned by the client,
/// so callers stay synchronous. Construct and drop it outside of any async
/// context; calling [`HttpClient::get`] from a blocking-pool thread is fine.
pub struct ReqwestClient {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl ReqwestClient {
    /// Creates a client that gives up connecting after `connect_timeout` and
    /// gives up on a response that stalls for longer than `read_timeout`.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(concat!("devlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SyncError::Config(format!("failed to start HTTP runtime: {}", e)))?;
        Ok(Self { client, runtime })
    }
}

impl HttpClient for ReqwestClient {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, String> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .query(query)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(|e| e.to_string())?;
            Ok(HttpResponse::new(status, body.to_vec()))
        })
    }
}
