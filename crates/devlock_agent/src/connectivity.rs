//! Connectivity checks gating sync attempts.

use crate::error::{SyncError, SyncResult};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Reports whether a network path currently exists.
pub trait Connectivity: Send + Sync {
    /// Returns true if a sync attempt can reach the network. May block
    /// briefly.
    fn is_connected(&self) -> bool;
}

/// Connectivity that is always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Probes the authority's host with a TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe for `host:port`.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Creates a probe for the host serving `endpoint`.
    pub fn for_endpoint(endpoint: &str, timeout: Duration) -> SyncResult<Self> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| SyncError::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::Config(format!("endpoint {:?} has no host", endpoint)))?;
        let port = url.port_or_known_default().ok_or_else(|| {
            SyncError::Config(format!("endpoint {:?} has no known port", endpoint))
        })?;
        Ok(Self::new(host, port, timeout))
    }

    fn addresses(&self) -> Vec<SocketAddr> {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                debug!(host = %self.host, error = %e, "host did not resolve");
                Vec::new()
            }
        }
    }
}

impl Connectivity for TcpProbe {
    fn is_connected(&self) -> bool {
        self.addresses()
            .iter()
            .any(|addr| TcpStream::connect_timeout(addr, self.timeout).is_ok())
    }
}

/// Connectivity toggled by hand, for testing.
#[derive(Debug)]
pub struct ManualConnectivity {
    connected: AtomicBool,
}

impl ManualConnectivity {
    /// Creates a switch in the given position.
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Flips the switch.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for ManualConnectivity {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn probe_from_endpoint() {
        let probe =
            TcpProbe::for_endpoint("https://mdm.example.com/api/devices/sync", Duration::from_secs(1))
                .unwrap();
        assert_eq!(probe.host, "mdm.example.com");
        assert_eq!(probe.port, 443);

        let probe =
            TcpProbe::for_endpoint("http://127.0.0.1:5000/api/devices/sync", Duration::from_secs(1))
                .unwrap();
        assert_eq!(probe.port, 5000);
    }

    #[test]
    fn probe_rejects_bad_endpoint() {
        let err = TcpProbe::for_endpoint("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn probe_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
        assert!(probe.is_connected());
    }

    #[test]
    fn probe_fails_without_listener() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(200));
        assert!(!probe.is_connected());
    }

    #[test]
    fn manual_switch() {
        let connectivity = ManualConnectivity::new(false);
        assert!(!connectivity.is_connected());
        connectivity.set_connected(true);
        assert!(connectivity.is_connected());
        assert!(AlwaysConnected.is_connected());
    }
}
