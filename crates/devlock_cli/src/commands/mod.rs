//! CLI command implementations.

pub mod provision;
pub mod run;
pub mod status;
pub mod sync;

use clap::Args;
use devlock_agent::{AgentConfig, InitialLockPolicy, RequestConfig};
use std::path::Path;
use std::time::Duration;

/// Options shared by the commands that talk to the authority.
#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Status endpoint of the lock authority
    #[arg(short, long, env = "DEVLOCK_ENDPOINT")]
    pub endpoint: String,

    /// Seconds allowed to establish a connection
    #[arg(long, default_value = "5")]
    pub connect_timeout: u64,

    /// Seconds allowed to read the response
    #[arg(long, default_value = "5")]
    pub read_timeout: u64,

    /// Start from the last known lock state instead of unlocked
    #[arg(long)]
    pub restore_last_known: bool,
}

impl AgentArgs {
    /// Builds the agent configuration.
    pub fn config(&self, data_dir: &Path) -> AgentConfig {
        let policy = if self.restore_last_known {
            InitialLockPolicy::RestoreLastKnown
        } else {
            InitialLockPolicy::FailOpen
        };

        AgentConfig::new(self.endpoint.clone(), data_dir)
            .with_request(RequestConfig::new(
                Duration::from_secs(self.connect_timeout),
                Duration::from_secs(self.read_timeout),
            ))
            .with_initial_policy(policy)
    }
}
