//! Device identity storage.
//!
//! The identity is written once, by provisioning, and only read by the sync
//! engine afterwards. An absent identity means the device has not been
//! provisioned yet.

use crate::error::SyncResult;
use crate::store::{read_json, write_json_private};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identifier of the device (e.g., its IMEI).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Creates an identity. Blank values are not identities.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == value.len() {
            Some(Self(value))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read access to the provisioned device identity.
pub trait IdentityStore: Send + Sync {
    /// Returns the identity, or `None` if the device is not provisioned.
    fn get(&self) -> SyncResult<Option<DeviceIdentity>>;
}

/// On-disk identity record.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityRecord {
    imei: String,
}

/// An identity store backed by a private JSON file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Creates a store reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self) -> SyncResult<Option<DeviceIdentity>> {
        let record: Option<IdentityRecord> = read_json(&self.path)?;
        Ok(record.and_then(|r| DeviceIdentity::new(r.imei)))
    }
}

/// Writes the identity record at `path`.
///
/// This belongs to the provisioning flow, not to the sync path.
pub fn provision(path: &Path, identity: &DeviceIdentity) -> SyncResult<()> {
    let record = IdentityRecord {
        imei: identity.as_str().to_string(),
    };
    write_json_private(path, &record)?;
    tracing::info!(path = %path.display(), "device identity provisioned");
    Ok(())
}

/// An in-memory identity store for testing.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: RwLock<Option<DeviceIdentity>>,
}

impl MemoryIdentityStore {
    /// Creates an unprovisioned store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `identity`. Blank values leave it unprovisioned.
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: RwLock::new(DeviceIdentity::new(identity)),
        }
    }

    /// Replaces the identity.
    pub fn set(&self, identity: Option<DeviceIdentity>) {
        *self.identity.write() = identity;
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self) -> SyncResult<Option<DeviceIdentity>> {
        Ok(self.identity.read().clone())
    }
}
