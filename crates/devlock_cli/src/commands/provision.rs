//! Provision command implementation.

use devlock_agent::{provision, DeviceIdentity, IDENTITY_FILE};
use std::path::Path;

/// Writes the device identity into `data_dir`.
pub fn run(data_dir: &Path, imei: &str) -> Result<(), Box<dyn std::error::Error>> {
    let identity = DeviceIdentity::new(imei).ok_or("IMEI must not be blank")?;
    let path = data_dir.join(IDENTITY_FILE);
    provision(&path, &identity)?;

    println!("✓ Device provisioned");
    println!("  IMEI: {}", identity);
    println!("  Path: {:?}", path);

    Ok(())
}
