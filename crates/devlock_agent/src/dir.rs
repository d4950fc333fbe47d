//! Data directory ownership.
//!
//! ```text
//! <data_dir>/
//! ├─ agent.lock        # Advisory lock, held while an agent runs
//! ├─ identity.json     # Provisioned device identity
//! └─ lock_state.json   # Last applied lock snapshot
//! ```
//!
//! Only one agent may sync against a data directory at a time. A second
//! agent would run its own attempts and emit signals no overlay listens to.

use crate::error::{SyncError, SyncResult};
use crate::store::create_private_dir;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// File name of the advisory lock inside the data directory.
pub const AGENT_LOCK_FILE: &str = "agent.lock";

/// Exclusive hold on a data directory, released on drop.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Creates the directory if needed and locks it.
    ///
    /// Fails with [`SyncError::DataDirLocked`] while another agent holds it.
    pub fn open(path: &Path) -> SyncResult<Self> {
        create_private_dir(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(AGENT_LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(SyncError::DataDirLocked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_is_refused() {
        let dir = tempdir().unwrap();
        let first = DataDir::open(dir.path()).unwrap();

        let err = DataDir::open(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::DataDirLocked { .. }));
        assert!(err.to_string().contains("in use by another agent"));

        drop(first);
        assert!(DataDir::open(dir.path()).is_ok());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("var").join("devlock");

        let data_dir = DataDir::open(&nested).unwrap();
        assert_eq!(data_dir.path(), nested.as_path());
        assert!(nested.join(AGENT_LOCK_FILE).exists());
    }
}
