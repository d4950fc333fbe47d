//! Persistence of lock state snapshots.
//!
//! Records are small JSON files written to a private, application-scoped
//! directory. Writes go through a temporary file and a rename so that a
//! crash never leaves a half-written record behind.

use crate::controller::LockSnapshot;
use crate::error::SyncResult;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Storage for the last applied lock state.
pub trait StateStore: Send + Sync {
    /// Loads the last saved snapshot, if any.
    fn load(&self) -> SyncResult<Option<LockSnapshot>>;

    /// Saves a snapshot, replacing the previous one.
    fn save(&self, snapshot: &LockSnapshot) -> SyncResult<()>;
}

/// A state store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Creates a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> SyncResult<Option<LockSnapshot>> {
        read_json(&self.path)
    }

    fn save(&self, snapshot: &LockSnapshot) -> SyncResult<()> {
        write_json_private(&self.path, snapshot)
    }
}

/// An in-memory state store for testing.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: RwLock<Option<LockSnapshot>>,
    saves: RwLock<u64>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    pub fn with_snapshot(snapshot: LockSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
            saves: RwLock::new(0),
        }
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Option<LockSnapshot> {
        self.snapshot.read().clone()
    }

    /// Returns how many times `save` was called.
    pub fn save_count(&self) -> u64 {
        *self.saves.read()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> SyncResult<Option<LockSnapshot>> {
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, snapshot: &LockSnapshot) -> SyncResult<()> {
        *self.snapshot.write() = Some(snapshot.clone());
        *self.saves.write() += 1;
        Ok(())
    }
}

/// Reads a JSON record. A missing file is `Ok(None)`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> SyncResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Writes a JSON record readable only by the owner.
///
/// Write-then-rename: the temporary file is synced before the rename and the
/// directory after it, so a crash leaves either the old or the new record.
pub(crate) fn write_json_private<T: Serialize>(path: &Path, value: &T) -> SyncResult<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        create_private_dir(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    restrict_permissions(&tmp, 0o600)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    sync_directory(parent.unwrap_or_else(|| Path::new(".")))
}

/// Syncs directory entries so a rename survives a crash.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> SyncResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> SyncResult<()> {
    Ok(())
}

pub(crate) fn create_private_dir(dir: &Path) -> SyncResult<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    restrict_permissions(dir, 0o700)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> SyncResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> SyncResult<()> {
    Ok(())
}
