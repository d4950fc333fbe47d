//! Status command implementation.

use devlock_agent::{
    FileIdentityStore, FileStateStore, IdentityStore, LockSnapshot, StateStore, IDENTITY_FILE,
    LOCK_STATE_FILE,
};
use serde::Serialize;
use std::path::Path;

/// Local agent state.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Data directory.
    pub data_dir: String,
    /// Provisioned identity, if any.
    pub imei: Option<String>,
    /// Last persisted lock state, if any.
    pub lock: Option<LockSnapshot>,
}

/// Reads the local state from `data_dir`.
pub fn collect(data_dir: &Path) -> Result<StatusReport, Box<dyn std::error::Error>> {
    let identity = FileIdentityStore::new(data_dir.join(IDENTITY_FILE)).get()?;
    let lock = FileStateStore::new(data_dir.join(LOCK_STATE_FILE)).load()?;

    Ok(StatusReport {
        data_dir: data_dir.display().to_string(),
        imei: identity.map(|id| id.as_str().to_string()),
        lock,
    })
}

/// Runs the status command.
pub fn run(data_dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = collect(data_dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_text_output(&report),
    }

    Ok(())
}

fn print_text_output(report: &StatusReport) {
    println!("Agent state at {}", report.data_dir);
    println!();
    match &report.imei {
        Some(imei) => println!("  IMEI:    {}", imei),
        None => println!("  IMEI:    (not provisioned)"),
    }
    match &report.lock {
        Some(lock) if lock.enforced => {
            println!("  Lock:    locked");
            println!("  Message: {}", lock.message);
            if !lock.support_phone.is_empty() {
                println!("  Support: {}", lock.support_phone);
            }
        }
        Some(_) => println!("  Lock:    unlocked"),
        None => println!("  Lock:    (never synced)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlock_agent::{provision, DeviceIdentity};
    use tempfile::tempdir;

    #[test]
    fn empty_data_dir() {
        let dir = tempdir().unwrap();
        let report = collect(dir.path()).unwrap();
        assert_eq!(report.imei, None);
        assert!(report.lock.is_none());
    }

    #[test]
    fn reports_identity_and_lock() {
        let dir = tempdir().unwrap();
        provision(
            &dir.path().join(IDENTITY_FILE),
            &DeviceIdentity::new("IMEI123").unwrap(),
        )
        .unwrap();
        FileStateStore::new(dir.path().join(LOCK_STATE_FILE))
            .save(&LockSnapshot {
                enforced: true,
                message: "Payment overdue".into(),
                support_phone: "555-1234".into(),
            })
            .unwrap();

        let report = collect(dir.path()).unwrap();
        assert_eq!(report.imei.as_deref(), Some("IMEI123"));
        assert!(report.lock.as_ref().unwrap().enforced);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["lock"]["supportPhone"], "555-1234");
    }
}
